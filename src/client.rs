//! Interactive terminal participant: stdin lines go to the relay, relay
//! lines go to stdout. `/exit` leaves; a closed server connection also ends
//! the program.

use anyhow::{Context, Result};
use tokio::{
    io::{self, AsyncWriteExt, BufReader, Stdin},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    select,
};
use tracing::warn;

use crate::{cli::ClientArgs, protocol};

pub async fn run(args: ClientArgs) -> Result<()> {
    let stream = TcpStream::connect((args.host.as_str(), args.port))
        .await
        .with_context(|| {
            format!(
                "Не удалось подключиться к серверу {}:{}",
                args.host, args.port
            )
        })?;
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut stdin = BufReader::new(io::stdin());

    write_stdout(&format!(
        "Подключено к серверу {}:{}",
        args.host, args.port
    ))
    .await?;

    write_stdout("Введите ваше имя: ").await?;
    let Some(name) = protocol::read_line(&mut stdin).await? else {
        return Ok(());
    };
    protocol::write_line(&mut writer, &name)
        .await
        .context("Ошибка отправки сообщения")?;

    write_stdout("Введите сообщение (или /exit для выхода):").await?;
    run_loop(&mut reader, &mut writer, &mut stdin).await?;
    shutdown_connection(&mut writer).await;
    Ok(())
}

async fn run_loop(
    reader: &mut BufReader<OwnedReadHalf>,
    writer: &mut OwnedWriteHalf,
    stdin: &mut BufReader<Stdin>,
) -> Result<()> {
    loop {
        select! {
            incoming = protocol::read_line(reader) => match incoming {
                Ok(Some(line)) => write_stdout(&line).await?,
                // A read error and a server-side close look the same from
                // the terminal.
                Ok(None) | Err(_) => {
                    write_stdout("Соединение с сервером потеряно").await?;
                    break;
                }
            },
            typed = protocol::read_line(stdin) => match typed? {
                None => break,
                Some(line) if line == "/exit" => break,
                Some(line) => {
                    if let Err(error) = protocol::write_line(writer, &line).await {
                        warn!(?error, "send failed");
                        write_stdout("Ошибка отправки сообщения").await?;
                        break;
                    }
                }
            },
            ctrl_c = tokio::signal::ctrl_c() => {
                if let Err(error) = ctrl_c {
                    warn!(?error, "failed to listen for ctrl-c");
                }
                break;
            }
        }
    }
    Ok(())
}

async fn write_stdout(line: &str) -> io::Result<()> {
    let mut stdout = io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}

async fn shutdown_connection(writer: &mut OwnedWriteHalf) {
    if let Err(error) = writer.shutdown().await {
        warn!(?error, "failed to shut the connection down cleanly");
    }
}
