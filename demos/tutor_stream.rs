//! Streaming tutoring example.
//!
//! Run with:
//! ```bash
//! export QASTREAM_BASE_URL="http://localhost:5000/api/cet4"
//! cargo run --example tutor_stream -- "Why is option C correct?"
//! ```

use std::io::Write;

use qastream::client::StreamClient;
use qastream::handler::Callbacks;
use qastream::logging;
use qastream::requests::TutoringQuestion;
use serde_json::json;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let question = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Why is option C correct?".to_string());

    let client = StreamClient::from_env()?;

    let request = TutoringQuestion {
        user_id: 1,
        segment_id: "reading-1".to_string(),
        question_type: "reading".to_string(),
        document: json!({"passage": "...", "questions": []}).to_string(),
        user_answers: vec![json!("A")],
        question,
    };

    // Ctrl-C stops the stream without further output.
    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    print!("Tutor: ");
    let callbacks = Callbacks::new(
        |content: String| {
            print!("{}", content);
            let _ = std::io::stdout().flush();
        },
        |summary| {
            println!("\n\n=== Stream Complete ===");
            for (key, value) in &summary.fields {
                println!("{}: {}", key, value);
            }
        },
        |error| eprintln!("\nError in stream: {}", error),
    );

    let session = client.run(&request, callbacks, cancel).await;
    println!("Session {} ended: {}", session.id(), session.state());

    Ok(())
}
