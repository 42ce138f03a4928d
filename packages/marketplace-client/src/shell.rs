//! Line-oriented marketplace shell.
//!
//! ```text
//! > list
//! > create 1000000000000000000 Vintage lamp
//! > buy 1
//! ```

use marketplace_types::Product;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::client::Session;
use crate::provider::Provider;

const HELP: &str = "\
commands:
  list                   refresh and show unsold products
  create <price> <name>  list a product (price in wei)
  buy <id>               buy a listed product at its listed price
  account                show the connected account
  help                   show this text
  quit                   leave the shell
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Create { name: String, price: i128 },
    Buy { id: u64 },
    Account,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line. `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut parts = line.trim().splitn(2, char::is_whitespace);
        let word = parts.next().unwrap_or_default();
        if word.is_empty() {
            return Ok(None);
        }
        let rest = parts.next().unwrap_or_default().trim();

        let command = match word.to_ascii_lowercase().as_str() {
            "list" | "ls" | "refresh" => Command::List,
            "create" => {
                let (price, name) = rest
                    .split_once(char::is_whitespace)
                    .ok_or("usage: create <price> <name>")?;
                let price = price
                    .parse::<i128>()
                    .map_err(|_| format!("price must be an integer amount of wei, got {price:?}"))?;
                Command::Create {
                    name: name.trim().to_string(),
                    price,
                }
            }
            "buy" => {
                let id = rest
                    .parse::<u64>()
                    .map_err(|_| format!("usage: buy <id> (got {rest:?})"))?;
                Command::Buy { id }
            }
            "account" | "whoami" => Command::Account,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(format!("unknown command {other:?}, try `help`")),
        };
        Ok(Some(command))
    }
}

/// Render a product table with prices in wei and ether.
pub fn render_products(products: &[Product]) -> String {
    if products.is_empty() {
        return "no products for sale\n".to_string();
    }
    let mut out = format!("{:>4}  {:<24}  {:>26}  {:>12}\n", "id", "name", "price (wei)", "ether");
    for p in products {
        out.push_str(&format!(
            "{:>4}  {:<24}  {:>26}  {:>12}\n",
            p.id,
            p.name,
            p.price,
            p.price.to_ether_string()
        ));
    }
    out
}

/// Read commands from `input` until EOF or `quit`, writing results to `output`.
///
/// Session errors are printed and the loop continues; only I/O errors end it.
pub async fn run_shell<P, R, W>(session: &Session<P>, input: R, mut output: W) -> std::io::Result<()>
where
    P: Provider,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    output
        .write_all(format!("connected as {}\n", session.account()).as_bytes())
        .await?;

    loop {
        output.write_all(b"> ").await?;
        output.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let command = match Command::parse(&line) {
            Ok(Some(c)) => c,
            Ok(None) => continue,
            Err(msg) => {
                output.write_all(format!("{msg}\n").as_bytes()).await?;
                continue;
            }
        };
        debug!(?command, "Shell command");

        let reply = match command {
            Command::Quit => break,
            Command::Help => HELP.to_string(),
            Command::Account => format!("{}\n", session.account()),
            Command::List => match session.list_unsold_products().await {
                Ok(view) => render_products(&view),
                Err(e) => format!("{}\n", e.user_message()),
            },
            Command::Create { name, price } => match session.create_product(&name, price).await {
                Ok(c) => format!("created {name:?} in {}\n{}", c.tx_id, render_products(&session.products())),
                Err(e) => format!("{}\n", e.user_message()),
            },
            Command::Buy { id } => match session.find_product(id) {
                None => format!("product {id} is not in the current list, run `list` first\n"),
                Some(product) => match session.buy_product(id, product.price).await {
                    Ok(c) => format!("bought {:?} in {}\n{}", product.name, c.tx_id, render_products(&session.products())),
                    Err(e) => format!("{}\n", e.user_message()),
                },
            },
        };
        output.write_all(reply.as_bytes()).await?;
    }

    output.flush().await
}
