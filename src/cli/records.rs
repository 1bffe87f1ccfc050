use anyhow::{Context, Result, bail};
use serde_json::json;
use uuid::Uuid;

use super::Runtime;
use crate::core::constants::AppConstants;
use crate::core::terminal::{self, print_info, print_success, print_warn};
use crate::core::tools::{EventSearchArgs, TaskSearchArgs};

/// Flags for the listing commands. Bare words are joined into the query.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct SearchFlags {
    pub query: Option<String>,
    pub types: Vec<String>,
    pub status: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub timezone: Option<String>,
}

pub(crate) fn parse_search_flags(args: &[String]) -> Result<SearchFlags> {
    let mut flags = SearchFlags::default();
    let mut words = Vec::new();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let takes_value = matches!(
            flag,
            "--query" | "-q" | "--type" | "--status" | "--from" | "--to" | "--limit" | "--offset" | "--tz"
        );
        if !takes_value {
            words.push(args[i].clone());
            i += 1;
            continue;
        }
        let Some(value) = args.get(i + 1).cloned() else {
            bail!("{} needs a value", flag);
        };
        match flag {
            "--query" | "-q" => words.push(value),
            "--type" => flags.types.push(value),
            "--status" => flags.status = Some(value),
            "--from" => flags.date_from = Some(value),
            "--to" => flags.date_to = Some(value),
            "--limit" => {
                flags.limit = Some(value.parse().with_context(|| format!("bad --limit {:?}", value))?)
            }
            "--offset" => {
                flags.offset = Some(value.parse().with_context(|| format!("bad --offset {:?}", value))?)
            }
            _ => flags.timezone = Some(value),
        }
        i += 2;
    }
    if !words.is_empty() {
        flags.query = Some(words.join(" "));
    }
    Ok(flags)
}

fn print_page<T: serde::Serialize>(items: &[T]) -> Result<()> {
    terminal::print_json(&json!({ "total": items.len(), "items": items }));
    if items.is_empty() {
        print_info("Nothing matched.");
    }
    Ok(())
}

pub(crate) async fn events(runtime: &Runtime, flags: SearchFlags) -> Result<()> {
    let items = runtime
        .tools
        .search_events(EventSearchArgs {
            query: flags.query,
            types: (!flags.types.is_empty()).then_some(flags.types),
            date_from: flags.date_from,
            date_to: flags.date_to,
            limit: flags.limit,
            offset: flags.offset,
        })
        .await?;
    print_page(&items)
}

pub(crate) async fn tasks(runtime: &Runtime, flags: SearchFlags) -> Result<()> {
    let items = runtime
        .tools
        .search_tasks(TaskSearchArgs {
            query: flags.query,
            status: flags.status,
            date_from: flags.date_from,
            date_to: flags.date_to,
            limit: flags.limit,
            offset: flags.offset,
        })
        .await?;
    print_page(&items)
}

pub(crate) async fn due(runtime: &Runtime, overdue: bool, flags: SearchFlags) -> Result<()> {
    let tz = flags.timezone.as_deref();
    let items = if overdue {
        runtime.tools.list_tasks_overdue(tz).await?
    } else {
        runtime.tools.list_tasks_today(tz).await?
    };
    print_page(&items)
}

pub(crate) async fn chat(runtime: &Runtime, text: &str) -> Result<()> {
    let text = text.trim();
    if text.is_empty() {
        print_warn("Usage: companion chat <text>");
        return Ok(());
    }
    let proposal = runtime.orchestrator.create_drafts(text).await?;
    if proposal.need_clarification {
        terminal::print_json(&serde_json::to_value(&proposal)?);
        return Ok(());
    }

    let request_id = Uuid::new_v4().to_string();
    let items = runtime
        .orchestrator
        .save_drafts(&request_id, &proposal.drafts)
        .await?;
    terminal::print_json(&json!({
        "drafts": items,
        "cards": proposal.cards,
        "request_id": request_id,
        "reply_to_user": proposal.reply_to_user,
    }));
    if !items.is_empty() {
        print_success(&format!(
            "Saved {} draft(s). Confirm with: companion confirm {}",
            items.len(),
            items
                .iter()
                .map(|d| d.draft_id.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        ));
    }
    Ok(())
}

pub(crate) async fn confirm(runtime: &Runtime, draft_ids: &[String]) -> Result<()> {
    let outcome = runtime.orchestrator.commit_drafts(draft_ids).await?;
    terminal::print_json(&serde_json::to_value(&outcome)?);
    print_success(&format!(
        "Committed {}. Undo with: companion undo {}",
        outcome.committed.len(),
        outcome.undo_token
    ));
    Ok(())
}

pub(crate) async fn undo(runtime: &Runtime, token: &str) -> Result<()> {
    let outcome = runtime.orchestrator.undo(token).await?;
    terminal::print_json(&serde_json::to_value(&outcome)?);
    print_success(&format!("Reversed {} action(s).", outcome.undone.len()));
    Ok(())
}

pub(crate) fn show_constants(constants: &AppConstants) -> Result<()> {
    terminal::print_status("timezone", &constants.defaults.timezone);
    terminal::print_json(&serde_json::to_value(constants)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn search_flags_collect_words_and_values() {
        let flags = parse_search_flags(&argv(&[
            "午饭", "--type", "expense", "--type", "meal", "--limit", "5", "--from",
            "2024-01-01T00:00:00+08:00", "面",
        ]))
        .unwrap();
        assert_eq!(flags.query.as_deref(), Some("午饭 面"));
        assert_eq!(flags.types, argv(&["expense", "meal"]));
        assert_eq!(flags.limit, Some(5));
        assert_eq!(flags.date_from.as_deref(), Some("2024-01-01T00:00:00+08:00"));
        assert_eq!(flags.offset, None);

        let flags = parse_search_flags(&argv(&["--tz", "Europe/Paris"])).unwrap();
        assert_eq!(flags.timezone.as_deref(), Some("Europe/Paris"));
        assert_eq!(flags.query, None);
        assert_eq!(parse_search_flags(&[]).unwrap(), SearchFlags::default());
    }

    #[test]
    fn search_flags_reject_bad_values() {
        assert!(parse_search_flags(&argv(&["--limit", "many"])).is_err());
        assert!(parse_search_flags(&argv(&["--status"])).is_err());
    }
}
