use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use url::Url;

use download_gateway::security::SignatureVerifier;

#[derive(Parser)]
#[command(name = "gateway-sign")]
#[command(about = "Produce signed download links for the download gateway", long_about = None)]
struct Cli {
    /// Shared token (the gateway's --token).
    #[arg(short, long)]
    token: String,

    /// Decoded file path, starting with '/'.
    #[arg(short, long)]
    path: String,

    /// Seconds until the link expires; 0 never expires.
    #[arg(short, long, default_value_t = 0)]
    expire_in: i64,

    /// Gateway base URL; when set, print the full link instead of the bare signature.
    #[arg(short, long)]
    base: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let path = if cli.path.starts_with('/') {
        cli.path.clone()
    } else {
        format!("/{}", cli.path)
    };

    let expire = if cli.expire_in > 0 {
        let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64;
        now + cli.expire_in
    } else {
        0
    };

    let sign = SignatureVerifier::new(cli.token.as_bytes()).sign(&path, expire);

    match cli.base {
        Some(base) => {
            let mut url = Url::parse(&base)?;
            let prefix = url.path().trim_end_matches('/').to_string();
            url.set_path(&format!("{}{}", prefix, path));
            url.query_pairs_mut().append_pair("sign", &sign);
            println!("{}", url);
        }
        None => println!("{}", sign),
    }

    Ok(())
}
