//! Line-based chat adapter: one reply from the engine becomes one block of
//! terminal output. The streaming/SSE abstraction of richer transports stays
//! outside the dialogue core.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::Result;

use lapadvisor_config::AppConfig;
use lapadvisor_dialogue::{DialogueEngine, DirectReply, Reply, TurnInput};
use lapadvisor_funnel::QuestionCard;

/// A funnel question the user has not answered yet.
struct PendingQuestion {
    session_id: String,
    step_index: usize,
}

pub(crate) async fn run(config: &AppConfig, engine: DialogueEngine) -> Result<()> {
    let sweep_secs = (config.funnel.sweep_interval_minutes * 60).max(60);
    let sweeper = engine.funnel().spawn_sweeper(Duration::from_secs(sweep_secs));

    println!("lapadvisor ready — ask about a model, a series, or just describe what you need.");
    println!("(type `exit` to quit)");

    let stdin = io::stdin();
    let mut pending: Option<PendingQuestion> = None;

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        let input = match pending.take() {
            Some(question) => TurnInput::FunnelAnswer {
                session_id: question.session_id,
                option_id: line.to_string(),
                step: Some(question.step_index),
            },
            None => TurnInput::Query { text: line.to_string() },
        };

        let reply = engine.handle_turn(input).await;
        render(&engine, reply, &mut pending).await;
    }

    sweeper.abort();
    Ok(())
}

async fn render(engine: &DialogueEngine, reply: Reply, pending: &mut Option<PendingQuestion>) {
    match reply {
        Reply::Direct(direct) => render_direct(engine, &direct),
        Reply::FunnelStart { session_id, message } => {
            println!("{message}");
            // The transport fetches the first question itself.
            match engine.next_question(&session_id).await {
                Reply::FunnelQuestion { session_id, step_index, total_steps, question, .. } => {
                    render_question(&question, step_index, total_steps);
                    *pending = Some(PendingQuestion { session_id, step_index });
                }
                Reply::Error { kind, message } => {
                    println!("error ({kind:?}): {message} — 請重新開始對話。");
                }
                _ => {}
            }
        }
        Reply::FunnelQuestion { session_id, step_index, total_steps, question, note } => {
            if let Some(note) = note {
                println!("(!) {note}");
            }
            render_question(&question, step_index, total_steps);
            *pending = Some(PendingQuestion { session_id, step_index });
        }
        Reply::FunnelBatch { session_id, questions } => {
            println!("一次回答以下 {} 個問題（session {session_id}）：", questions.len());
            for (index, question) in questions.iter().enumerate() {
                render_question(question, index, questions.len());
            }
        }
        Reply::FunnelComplete { preferences, reply, .. } => {
            let chosen: Vec<&str> = preferences.iter().map(|p| p.label.as_str()).collect();
            println!("已記錄偏好：{}", chosen.join("、"));
            render_direct(engine, &reply);
        }
        Reply::Error { kind, message } => {
            println!("error ({kind:?}): {message} — 請重新開始對話。");
        }
    }
}

fn render_question(question: &QuestionCard, step_index: usize, total_steps: usize) {
    println!("[{}/{}] {}", step_index + 1, total_steps, question.question);
    for option in &question.options {
        if option.description.is_empty() {
            println!("  {} — {}", option.option_id, option.label);
        } else {
            println!("  {} — {} ({})", option.option_id, option.label, option.description);
        }
    }
    println!("輸入選項代號作答。");
}

fn render_direct(engine: &DialogueEngine, reply: &DirectReply) {
    println!("{}", reply.summary);
    let rows = reply.clipped_table(engine.display_width());
    if rows.is_empty() {
        return;
    }

    for row in &rows {
        let cells: Vec<String> = row
            .cells
            .iter()
            .map(|(name, value)| format!("{name}: {value}"))
            .collect();
        println!("  {} | {}", row.feature, cells.join(" | "));
    }
}
