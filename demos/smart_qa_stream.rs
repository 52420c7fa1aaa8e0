//! Smart-QA example consuming events as a `Stream`.
//!
//! Run with:
//! ```bash
//! export QASTREAM_BASE_URL="http://localhost:5000/api/cet4"
//! cargo run --example smart_qa_stream -- 42 "Which section cost me the most points?"
//! ```

use std::io::Write;

use futures::StreamExt;
use qastream::client::StreamClient;
use qastream::logging;
use qastream::model::Event;
use qastream::requests::SmartQaQuestion;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let mut args = std::env::args().skip(1);
    let user_id: i64 = args.next().as_deref().unwrap_or("1").parse()?;
    let question = args
        .next()
        .unwrap_or_else(|| "Which section cost me the most points?".to_string());

    let client = StreamClient::from_env()?;
    let events = client.events(&SmartQaQuestion::new(user_id, question)).await;
    futures::pin_mut!(events);

    while let Some(event) = events.next().await {
        match event {
            Event::Chunk { content } => {
                print!("{}", content);
                std::io::stdout().flush()?;
            }
            Event::Done { summary } => {
                println!("\n\n=== Stream Complete ===");
                if !summary.acknowledged {
                    println!("(server closed the stream without a done record)");
                }
                if let Some(round) = summary.get("round_id") {
                    println!("Round: {}", round);
                }
            }
            Event::Error { error } => {
                eprintln!("\nError in stream: {}", error);
                return Err(error.into());
            }
        }
    }

    Ok(())
}
