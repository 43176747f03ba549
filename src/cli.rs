use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the relay server.
    Server(ServerArgs),
    /// Connect to a relay as a terminal participant.
    Client(ClientArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    /// Port to listen on; 0 lets the OS pick one.
    #[arg(long, default_value_t = 1234)]
    pub port: u16,

    /// Event journal file, appended to and never truncated.
    #[arg(long, default_value = "chat.log")]
    pub log_file: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// Host of the relay to connect to.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port of the relay to connect to.
    #[arg(long, default_value_t = 1234)]
    pub port: u16,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn server_defaults() {
        let cli = Cli::parse_from(["chat-relay", "server"]);
        let Command::Server(args) = cli.command else {
            panic!("expected the server subcommand");
        };
        assert_eq!(args.port, 1234);
        assert_eq!(args.log_file, PathBuf::from("chat.log"));
    }

    #[test]
    fn client_accepts_host_and_port() {
        let cli = Cli::parse_from([
            "chat-relay",
            "client",
            "--host",
            "192.168.0.10",
            "--port",
            "4321",
        ]);
        let Command::Client(args) = cli.command else {
            panic!("expected the client subcommand");
        };
        assert_eq!(args.host, "192.168.0.10");
        assert_eq!(args.port, 4321);
    }
}
