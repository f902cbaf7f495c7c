//! Fetch a URL wearing a chosen browser's fingerprint.
//!
//! ```sh
//! cargo run --example fetch -- https://example.com
//! ```

use veneer::{Browser, Veneer};

fn main() {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://example.com/".to_string());

    let client = veneer::Client::new().expect("client");
    let response = Veneer::get(&url).browser(Browser::Chrome131).send(&client);

    match response.error {
        None => {
            println!("status: {}", response.status);
            println!("version: {:?}", response.version);
            if let Some(ref ja3) = response.tls.ja3 {
                println!("ja3: {ja3}");
            }
            if let Some(ref cipher) = response.tls.cipher {
                println!("cipher: {cipher}");
            }
            println!("body: {} bytes", response.body_len());
        }
        Some(kind) => {
            eprintln!(
                "request failed ({kind:?}): {}",
                response.error_message.unwrap_or_default()
            );
            std::process::exit(1);
        }
    }
}
