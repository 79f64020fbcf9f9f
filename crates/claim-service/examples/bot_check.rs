//! 机器人配置诊断
//!
//! 列出库里的机器人、活跃活动和 Telegram 侧的 webhook 注册状态。
//! 只读诊断，不修改任何数据。
//!
//! ```bash
//! GIVEAWAY_DATABASE_URL=postgres://... cargo run -p giveaway-claim-service --example bot_check
//! ```

use giveaway_shared::config::AppConfig;
use giveaway_shared::database::Database;
use sqlx::Row;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("claim-service").unwrap_or_default();
    let db = Database::connect(&config.database).await?;
    let http = reqwest::Client::new();

    let bots = sqlx::query("SELECT id, username, token, is_active FROM bots ORDER BY id")
        .fetch_all(db.pool())
        .await?;

    println!("Found {} bots in database.", bots.len());
    if bots.is_empty() {
        println!("No bots found. Please create a bot first.");
        return Ok(());
    }

    for bot in &bots {
        let id: i64 = bot.get("id");
        let username: String = bot.get("username");
        let token: String = bot.get("token");
        let is_active: bool = bot.get("is_active");

        println!("\nBot: {} (Active: {})", username, is_active);
        let masked = if token.len() > 10 {
            format!("{}...{}", &token[..5], &token[token.len() - 5..])
        } else {
            "<short>".to_string()
        };
        println!("Token: {} (Length: {})", masked, token.len());

        check_webhook(&http, &config.telegram.api_base, &token).await;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM campaigns WHERE bot_id = $1")
                .bind(id)
                .fetch_one(db.pool())
                .await?;
        let campaigns = sqlx::query(
            r#"
            SELECT sequence, title, kind, prerequisite_threshold
            FROM campaigns
            WHERE bot_id = $1 AND is_active = true
            ORDER BY sequence ASC NULLS LAST
            "#,
        )
        .bind(id)
        .fetch_all(db.pool())
        .await?;

        println!("Total Campaigns: {}", total);
        println!("Active Campaigns: {}", campaigns.len());
        if total > 0 && campaigns.is_empty() {
            println!("!!! WARNING: You have campaigns for this bot, but NONE are active.");
        }

        for campaign in &campaigns {
            let sequence: Option<i32> = campaign.get("sequence");
            let title: String = campaign.get("title");
            let kind: String = campaign.get("kind");
            let threshold: Option<i32> = campaign.get("prerequisite_threshold");
            let pre_info = threshold
                .map(|t| format!(" (Prereq: Seq <= {})", t))
                .unwrap_or_default();
            println!(
                "  - [{}] {} ({}){}",
                sequence.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
                title,
                kind,
                pre_info
            );
        }
    }

    Ok(())
}

/// 查询 Telegram 侧注册的 webhook
async fn check_webhook(http: &reqwest::Client, api_base: &str, token: &str) {
    let url = format!("{}/bot{}/getWebhookInfo", api_base.trim_end_matches('/'), token);
    match http.get(&url).send().await {
        Ok(resp) => match resp.json::<serde_json::Value>().await {
            Ok(data) if data["ok"].as_bool() == Some(true) => {
                let info = &data["result"];
                let webhook_url = info["url"].as_str().unwrap_or("");
                if webhook_url.is_empty() {
                    println!("No webhook registered on Telegram!");
                } else {
                    println!("Registered Webhook: {}", webhook_url);
                    if let Some(err) = info["last_error_message"].as_str() {
                        println!("Last Error: {}", err);
                    }
                }
            }
            Ok(data) => {
                println!(
                    "Could not fetch webhook info: {}",
                    data["description"].as_str().unwrap_or("unknown")
                );
            }
            Err(e) => println!("Error decoding webhook info: {}", e),
        },
        Err(e) => println!("Error checking webhook: {}", e),
    }
}
