//!
//! velovis CLI binary
//! ------------------
//! Drives a storefront backend from the terminal with the same client core the
//! hosts embed. Session and guest cart persist under the storage directory, so
//! `login` in one invocation is still active in the next.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

use velovis::cli::{cart_table, orders_table, products_table};
use velovis::config::ClientConfig;
use velovis::telemetry;
use velovis::StorefrontClient;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--config <file>] [--api <url>] [--storage <dir>] <command> [args]\n\nCommands:\n  login <username> <password>        sign in and keep the session\n  logout                             sign out (server-side best effort)\n  whoami                             show the signed-in user\n  products                           list products\n  product <id>                       show one product\n  cart                               show the cart\n  cart add <product-id> <qty> [size] add to the cart\n  cart rm <line-id>                  remove a cart line\n  cart qty <line-id> <qty>           change a line's quantity\n  orders                             list my orders\n  track <order-id> <email>           look up a guest order\n\nEnvironment:\n  VELOVIS_API_URL, VELOVIS_STORAGE_DIR, VELOVIS_HTTP_TIMEOUT_MS, VELOVIS_GUEST_CART, RUST_LOG\n\nDefaults:\n  --storage defaults to .velovis in the current directory."
    );
}

struct Args {
    config: Option<PathBuf>,
    api: Option<String>,
    storage: Option<PathBuf>,
    command: Vec<String>,
}

fn parse_args(mut it: impl Iterator<Item = String>) -> Result<Args> {
    let mut args = Args { config: None, api: None, storage: None, command: Vec::new() };
    while let Some(a) = it.next() {
        match a.as_str() {
            "--config" => args.config = Some(PathBuf::from(it.next().ok_or_else(|| anyhow!("--config needs a file"))?)),
            "--api" => args.api = Some(it.next().ok_or_else(|| anyhow!("--api needs a URL"))?),
            "--storage" => args.storage = Some(PathBuf::from(it.next().ok_or_else(|| anyhow!("--storage needs a directory"))?)),
            _ => {
                args.command.push(a);
                args.command.extend(it.by_ref());
            }
        }
    }
    Ok(args)
}

fn quantity(s: &str) -> Result<u32> {
    s.parse::<u32>().with_context(|| format!("'{}' is not a quantity", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init("warn,velovis=info");

    let mut raw = env::args();
    let program = raw.next().unwrap_or_else(|| "velovis_cli".to_string());
    let args = parse_args(raw)?;
    if args.command.is_empty() || matches!(args.command[0].as_str(), "-h" | "--help" | "help") {
        print_usage(&program);
        return Ok(());
    }

    let mut config = ClientConfig::load(args.config.as_deref())?;
    if let Some(api) = args.api {
        config.api_base_url = api;
    }
    if let Some(dir) = args.storage {
        config.storage_dir = Some(dir);
    }
    if config.storage_dir.is_none() {
        config.storage_dir = Some(PathBuf::from(".velovis"));
    }

    let client = StorefrontClient::connect(config).await?;
    let cmd: Vec<&str> = args.command.iter().map(String::as_str).collect();
    match cmd.as_slice() {
        ["login", user, password] => {
            let me = client.auth().sign_in(user, password).await?;
            println!("signed in as {} ({})", me.username, me.id);
        }
        ["logout"] => {
            client.auth().sign_out().await;
            println!("signed out");
        }
        ["whoami"] => match client.session().user() {
            Some(u) => {
                let caps = client.capabilities();
                println!("{} <{}> roles={:?} admin_console={}", u.username, u.email, u.roles, caps.view_console);
            }
            None => println!("not signed in"),
        },
        ["products"] => println!("{}", products_table(&client.catalog().list_products().await?)),
        ["product", id] => {
            let p = client.catalog().get_product(id).await?;
            println!("{}", serde_json::to_string_pretty(&p)?);
        }
        ["cart"] => println!("{}", cart_table(&client.cart().snapshot())),
        ["cart", "add", product, qty, rest @ ..] => {
            let size = rest.first().copied();
            client.cart().add_item(product, quantity(qty)?, size).await?;
            println!("{}", cart_table(&client.cart().snapshot()));
        }
        ["cart", "rm", line] => {
            client.cart().remove_item(line).await?;
            println!("{}", cart_table(&client.cart().snapshot()));
        }
        ["cart", "qty", line, qty] => {
            client.cart().update_item_quantity(line, quantity(qty)?).await?;
            println!("{}", cart_table(&client.cart().snapshot()));
        }
        ["orders"] => println!("{}", orders_table(&client.orders().my_orders().await?)),
        ["track", order, email] => {
            let o = client.orders().track(order, email).await?;
            println!("{}", orders_table(std::slice::from_ref(&o)));
        }
        _ => {
            print_usage(&program);
            bail!("unknown command: {}", args.command.join(" "));
        }
    }
    Ok(())
}
