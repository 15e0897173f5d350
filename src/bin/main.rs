use financial_query_orchestrator::{
    agent::{Orchestrator, USAGE_EXAMPLES},
    config::Settings,
};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn print_banner() {
    println!("=== 주식 정보 질의 ===");
    println!("예시 질문:");
    for example in USAGE_EXAMPLES {
        println!("  - {}", example);
    }
    println!("명령: help | status | exit");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let orchestrator = Orchestrator::from_settings(&settings).await?;

    info!(summarizer = orchestrator.summarizer_name(), "Interactive shell starting");
    print_banner();

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    loop {
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        match input {
            "" => continue,
            "exit" | "quit" | "q" | "종료" => break,
            "help" | "도움말" => print_banner(),
            "status" | "상태" => {
                println!("summarizer: {}", orchestrator.summarizer_name());
                for (capability, description) in orchestrator.capabilities() {
                    println!("  {:<18} {}", capability.as_str(), description);
                }
            }
            query => {
                let response = orchestrator.handle(query).await;
                if response.is_success() {
                    println!("{}", response.response.unwrap_or_default());
                } else {
                    println!(
                        "오류: {}",
                        response.message.unwrap_or_else(|| "알 수 없는 오류".to_string())
                    );
                }
            }
        }
    }

    println!("종료합니다.");
    Ok(())
}
