//! 活动编号修复
//!
//! 给每个机器人下的活动按 id 顺序重新分配 1..N 的展示编号。
//! 用于早期没有编号或编号出现空洞的数据。
//!
//! ```bash
//! GIVEAWAY_DATABASE_URL=postgres://... cargo run -p giveaway-claim-service --example fix_sequences
//! ```

use giveaway_shared::config::AppConfig;
use giveaway_shared::database::Database;
use sqlx::Row;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("claim-service").unwrap_or_default();
    let db = Database::connect(&config.database).await?;

    let bots = sqlx::query("SELECT id, username FROM bots ORDER BY id")
        .fetch_all(db.pool())
        .await?;

    for bot in &bots {
        let bot_id: i64 = bot.get("id");
        let username: String = bot.get("username");
        println!("Processing bot: {}", username);

        let campaigns = sqlx::query("SELECT id, title FROM campaigns WHERE bot_id = $1 ORDER BY id")
            .bind(bot_id)
            .fetch_all(db.pool())
            .await?;

        // 先清空再按 id 顺序回填，避免撞上 (bot_id, sequence) 唯一约束
        sqlx::query("UPDATE campaigns SET sequence = NULL WHERE bot_id = $1")
            .bind(bot_id)
            .execute(db.pool())
            .await?;

        for (index, campaign) in campaigns.iter().enumerate() {
            let campaign_id: i64 = campaign.get("id");
            let title: String = campaign.get("title");
            let sequence = (index + 1) as i32;

            sqlx::query("UPDATE campaigns SET sequence = $2 WHERE id = $1")
                .bind(campaign_id)
                .bind(sequence)
                .execute(db.pool())
                .await?;

            println!("  - [{}] {} -> Sequence: {}", campaign_id, title, sequence);
        }
    }

    println!("Successfully repaired campaign sequences.");
    Ok(())
}
