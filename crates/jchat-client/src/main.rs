//! Chat client binary: connects to a server, runs the dispatcher on its own
//! task, and drives an interactive REPL over stdin (§6 CLI surface).

use std::sync::Arc;

use clap::Parser;
use jchat_core::{ConnectionIdAllocator, ConnectionRegistry, Dispatcher};
use jchat_client::{
    ChannelComponentClient, ChannelEvent, HandshakeComplete, IdentifyComplete, LocalUserState,
    MessageReceived, SendMessageComplete, SystemComponentClient, UserComponentClient,
};
use jchat_protocol::SystemResult;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tracing_subscriber::EnvFilter;

/// A chat client speaking the jchat wire protocol.
#[derive(Parser, Debug)]
#[command(name = "jchat-client")]
struct Args {
    /// Address to connect to.
    #[arg(long = "ipaddress", default_value = "127.0.0.1")]
    ip_address: String,

    /// Port to connect to.
    #[arg(long, default_value_t = 9998)]
    port: u16,

    /// Username to identify as immediately after the handshake completes.
    #[arg(long)]
    username: Option<String>,

    /// Default log level, overridable per-module via `RUST_LOG`.
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,
}

fn main() -> std::io::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let rt = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    rt.block_on(run(args))
}

async fn run(args: Args) -> std::io::Result<()> {
    let addr = format!("{}:{}", args.ip_address, args.port);
    let stream = TcpStream::connect(&addr).await?;
    let peer_addr = stream.peer_addr().map(|a| a.to_string()).unwrap_or_else(|_| addr.clone());
    println!("connected to {addr}");

    let local_user = Arc::new(LocalUserState::new());
    let system_component = Arc::new(SystemComponentClient::new(local_user.clone()));
    let user_component = Arc::new(UserComponentClient::new(local_user.clone()));
    let channel_component = Arc::new(ChannelComponentClient::new(local_user));

    wire_up_printers(&system_component, &user_component, &channel_component, args.username.clone());

    let connection_registry = Arc::new(ConnectionRegistry::new());
    let id_alloc = ConnectionIdAllocator::new();
    let connection_id = id_alloc.allocate();

    let mut dispatcher = Dispatcher::new(connection_id, connection_registry, peer_addr, stream);
    dispatcher.register_component(system_component.clone()).expect("system registers once");
    dispatcher.register_component(user_component.clone()).expect("user registers once");
    dispatcher.register_component(channel_component.clone()).expect("channel registers once");

    let dispatcher_task = tokio::spawn(dispatcher.run());

    print_help();
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Err(message) = dispatch_command(line, &user_component, &channel_component) {
            println!("error: {message}");
        }
        if line == "/quit" {
            break;
        }
    }

    drop(dispatcher_task);
    Ok(())
}

fn wire_up_printers(
    system: &Arc<SystemComponentClient>,
    user: &Arc<UserComponentClient>,
    channel: &Arc<ChannelComponentClient>,
    auto_identify: Option<String>,
) {
    let user_for_identify = user.clone();
    system.on_handshake_complete.subscribe(false, move |event: &HandshakeComplete| {
        if event.result == SystemResult::Ok {
            println!("handshake complete");
            if let Some(username) = &auto_identify
                && let Err(e) = user_for_identify.identify(username)
            {
                println!("error: {e}");
            }
        } else {
            println!("handshake rejected: {:?}", event.result);
        }
        true
    });

    user.on_identify_complete.subscribe(false, |event: &IdentifyComplete| {
        println!("identify({}) -> {:?}", event.username, event.result);
        true
    });
    user.on_send_message_complete.subscribe(false, |event: &SendMessageComplete| {
        println!("msg({}) -> {:?}", event.target_username, event.result);
        true
    });
    user.on_message_received.subscribe(false, |event: &MessageReceived| {
        println!("[dm] {}: {}", event.from_username, event.message);
        true
    });

    channel.on_event.subscribe(false, |event: &ChannelEvent| {
        print_channel_event(event);
        true
    });
}

fn print_channel_event(event: &ChannelEvent) {
    match event {
        ChannelEvent::JoinComplete { name, result } => println!("join({name}) -> {result:?}"),
        ChannelEvent::UserJoined { name, username, .. } => println!("[{name}] {username} joined"),
        ChannelEvent::LeaveComplete { name, result } => println!("leave({name}) -> {result:?}"),
        ChannelEvent::UserLeft { name, username, .. } => println!("[{name}] {username} left"),
        ChannelEvent::SendComplete { name, result, .. } => println!("send({name}) -> {result:?}"),
        ChannelEvent::MessageReceived { name, username, text, .. } => println!("[{name}] {username}: {text}"),
        ChannelEvent::KickComplete { name, result, target } => println!("kick({name}, {target}) -> {result:?}"),
        ChannelEvent::UserKicked { name, username, .. } => println!("[{name}] {username} was kicked"),
        ChannelEvent::BanComplete { name, result, target } => println!("ban({name}, {target}) -> {result:?}"),
        ChannelEvent::UserBanned { name, username, .. } => println!("[{name}] {username} was banned"),
        ChannelEvent::OpComplete { name, result, target } => println!("op({name}, {target}) -> {result:?}"),
        ChannelEvent::UserOpped { name, username, .. } => println!("[{name}] {username} is now an operator"),
        ChannelEvent::DeopComplete { name, result, target } => println!("deop({name}, {target}) -> {result:?}"),
        ChannelEvent::UserDeopped { name, username, .. } => println!("[{name}] {username} is no longer an operator"),
        ChannelEvent::UnbanComplete { name, result, target } => println!("unban({name}, {target}) -> {result:?}"),
        ChannelEvent::UserUnbanned { name, username } => println!("[{name}] {username} was unbanned"),
    }
}

fn dispatch_command(
    line: &str,
    user: &Arc<UserComponentClient>,
    channel: &Arc<ChannelComponentClient>,
) -> Result<(), String> {
    let mut parts = line.splitn(2, ' ');
    let command = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or_default().trim();

    match command {
        "/help" => {
            print_help();
            Ok(())
        }
        "/quit" => Ok(()),
        "/identify" => user.identify(rest).map_err(|e| e.to_string()),
        "/join" => channel.join_channel(rest).map_err(|e| e.to_string()),
        "/leave" => channel.leave_channel(rest).map_err(|e| e.to_string()),
        "/msg" => {
            let (target, message) = split_two(rest)?;
            user.send_message(target, message).map_err(|e| e.to_string())
        }
        "/send" => {
            let (name, text) = split_two(rest)?;
            channel.send_message(name, text).map_err(|e| e.to_string())
        }
        "/kick" => {
            let (name, target) = split_two(rest)?;
            channel.kick_user(name, target).map_err(|e| e.to_string())
        }
        "/ban" => {
            let (name, target) = split_two(rest)?;
            channel.ban_user(name, target).map_err(|e| e.to_string())
        }
        "/op" => {
            let (name, target) = split_two(rest)?;
            channel.op_user(name, target).map_err(|e| e.to_string())
        }
        "/deop" => {
            let (name, target) = split_two(rest)?;
            channel.deop_user(name, target).map_err(|e| e.to_string())
        }
        "/unban" => {
            let (name, target) = split_two(rest)?;
            channel.unban_user(name, target).map_err(|e| e.to_string())
        }
        other => Err(format!("unknown command {other}, try /help")),
    }
}

fn split_two(rest: &str) -> Result<(&str, &str), String> {
    let mut parts = rest.splitn(2, ' ');
    let first = parts.next().filter(|s| !s.is_empty()).ok_or("expected two arguments")?;
    let second = parts.next().map(str::trim).filter(|s| !s.is_empty()).ok_or("expected two arguments")?;
    Ok((first, second))
}

fn print_help() {
    println!(
        "commands: /identify <username>, /join <#channel>, /leave <#channel>, \
         /send <#channel> <text>, /msg <username> <text>, /kick <#channel> <username>, \
         /ban <#channel> <username>, /op <#channel> <username>, /deop <#channel> <username>, \
         /unban <#channel> <username>, /quit, /help"
    );
}
