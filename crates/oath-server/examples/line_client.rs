//! Interactive plaintext dynalogin client.
//!
//! Reads commands from stdin, sends them to the server and prints every
//! reply line. Only useful against a server started without TLS.

use std::env;
use std::error::Error;
use std::io::{self, Write};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Where to connect: env override or default.
    let addr = env::var("OATH_CLIENT_ADDR").unwrap_or_else(|_| "127.0.0.1:57653".to_string());

    println!("Connecting to {}...", addr);
    let stream = TcpStream::connect(&addr).await?;
    let mut server = BufReader::new(stream);
    println!("Connected.");
    println!("Type commands like:");
    println!("  UDATA HOTP sam 755224");
    println!("  UDATA TOTP tina 287082");
    println!("  QUIT");
    println!();

    if !print_replies(&mut server).await? {
        return Ok(());
    }

    let stdin = io::stdin();
    loop {
        print!(">> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            println!("\nEOF on stdin, exiting client.");
            break;
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        server.write_all(trimmed.as_bytes()).await?;
        server.write_all(b"\r\n").await?;

        if !print_replies(&mut server).await? {
            break;
        }
    }

    Ok(())
}

/// Print reply lines until a final (`<code> `) reply arrives.
///
/// Returns `false` once the server has closed the connection.
async fn print_replies(server: &mut BufReader<TcpStream>) -> Result<bool, Box<dyn Error>> {
    loop {
        let mut reply = String::new();
        let n = match timeout(Duration::from_secs(15), server.read_line(&mut reply)).await {
            Ok(res) => res?,
            Err(_) => {
                eprintln!("Timed out waiting for a reply.");
                return Ok(false);
            }
        };
        if n == 0 {
            println!("Connection closed by server.");
            return Ok(false);
        }

        print!("<< {}", reply);
        if reply.as_bytes().get(3) != Some(&b'-') {
            return Ok(true);
        }
    }
}
