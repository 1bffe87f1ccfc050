use serde_json::{Value, json};
use tracing::info;

use super::LedgerTools;
use super::args::{EventSearchArgs, ExpenseArgs, LifelogArgs, MealArgs, MoodArgs};
use super::validate::{
    normalize_tags, page, require_enum, require_in_range, require_non_empty_str,
    require_positive_number,
};
use crate::core::error::{ToolError, ToolResult};
use crate::core::store::types::{EventFilter, EventRecord, NewEvent};
use crate::core::time;

/// Fields every event-creating tool shares.
struct EventEnvelope<'a> {
    happened_at: Option<&'a str>,
    tags: Option<&'a Value>,
    source: Option<&'a str>,
    confidence: Option<f64>,
    idempotency_key: Option<String>,
}

impl LedgerTools {
    async fn create_event(
        &self,
        event_type: &str,
        data: Value,
        env: EventEnvelope<'_>,
    ) -> ToolResult<EventRecord> {
        let event_type = require_enum(event_type, "type", &self.constants.event.types)?;
        let happened_at = match env.happened_at {
            Some(value) => time::ensure_iso8601(value)?,
            None => self.now(),
        };
        let tags = normalize_tags(env.tags, self.constants.limits.max_tags)?;
        let source = require_enum(
            env.source.unwrap_or(self.constants.defaults.source.as_str()),
            "source",
            &self.constants.sources,
        )?;
        let confidence = require_in_range(
            env.confidence.unwrap_or(self.constants.defaults.confidence),
            "confidence",
            0.0,
            1.0,
        )?;

        let event = self
            .store
            .insert_event(
                NewEvent {
                    event_type,
                    data,
                    happened_at,
                    tags,
                    source,
                    confidence,
                    idempotency_key: env.idempotency_key,
                },
                &self.now(),
            )
            .await?;
        info!("Recorded {} event {}", event.event_type, event.event_id);
        Ok(event)
    }

    pub(super) async fn find_events(&self, args: EventSearchArgs) -> ToolResult<Vec<EventRecord>> {
        let (limit, offset) = page(args.limit, args.offset)?;
        let types = args
            .types
            .unwrap_or_default()
            .iter()
            .map(|t| require_enum(t, "type", &self.constants.event.types))
            .collect::<ToolResult<Vec<_>>>()?;
        let filter = EventFilter {
            query: args.query,
            types,
            date_from: args.date_from.as_deref().map(time::ensure_iso8601).transpose()?,
            date_to: args.date_to.as_deref().map(time::ensure_iso8601).transpose()?,
            limit,
            offset,
        };
        self.store.search_events(&filter).await
    }

    pub(super) async fn create_expense(&self, args: ExpenseArgs) -> ToolResult<EventRecord> {
        let amount = require_positive_number(args.amount, "amount")?;
        let category = require_enum(
            args.category
                .as_deref()
                .unwrap_or(self.constants.expense.default_category.as_str()),
            "category",
            &self.constants.expense.categories,
        )?;
        let currency = match args.currency.as_deref() {
            Some(c) => require_non_empty_str(Some(c), "currency")?,
            None => self.constants.defaults.currency.clone(),
        };
        let data = json!({
            "amount": amount,
            "currency": currency,
            "category": category,
            "note": args.note,
        });
        self.create_event(
            "expense",
            data,
            EventEnvelope {
                happened_at: args.happened_at.as_deref(),
                tags: args.tags.as_ref(),
                source: args.source.as_deref(),
                confidence: args.confidence,
                idempotency_key: args.idempotency_key,
            },
        )
        .await
    }

    pub(super) async fn create_lifelog(&self, args: LifelogArgs) -> ToolResult<EventRecord> {
        let text = require_non_empty_str(args.text.as_deref(), "text")?;
        if text.chars().count() > self.constants.limits.max_text_len {
            return Err(ToolError::invalid_param(format!(
                "text must be at most {} characters",
                self.constants.limits.max_text_len
            )));
        }
        self.create_event(
            "lifelog",
            json!({ "text": text }),
            EventEnvelope {
                happened_at: args.happened_at.as_deref(),
                tags: args.tags.as_ref(),
                source: args.source.as_deref(),
                confidence: args.confidence,
                idempotency_key: args.idempotency_key,
            },
        )
        .await
    }

    pub(super) async fn create_meal(&self, args: MealArgs) -> ToolResult<EventRecord> {
        let meal_type = require_enum(
            args.meal_type.as_deref().unwrap_or_default(),
            "meal_type",
            &self.constants.meal.types,
        )?;
        let Some(raw_items) = args.items else {
            return Err(ToolError::invalid_param("items must be list of strings"));
        };
        let items = raw_items
            .iter()
            .map(|i| require_non_empty_str(Some(i), "item"))
            .collect::<ToolResult<Vec<_>>>()?;
        if items.is_empty() {
            return Err(ToolError::invalid_param("items must be non-empty list"));
        }
        self.create_event(
            "meal",
            json!({ "meal_type": meal_type, "items": items }),
            EventEnvelope {
                happened_at: args.happened_at.as_deref(),
                tags: args.tags.as_ref(),
                source: args.source.as_deref(),
                confidence: args.confidence,
                idempotency_key: args.idempotency_key,
            },
        )
        .await
    }

    pub(super) async fn create_mood(&self, args: MoodArgs) -> ToolResult<EventRecord> {
        let mood = require_non_empty_str(args.mood.as_deref(), "mood")?;
        let intensity = require_in_range(args.intensity.unwrap_or(0.5), "intensity", 0.0, 1.0)?;
        let data = json!({
            "mood": mood,
            "intensity": intensity,
            "topic": args.topic,
            "note": args.note,
        });
        self.create_event(
            "mood",
            data,
            EventEnvelope {
                happened_at: args.happened_at.as_deref(),
                tags: args.tags.as_ref(),
                source: args.source.as_deref(),
                confidence: args.confidence,
                idempotency_key: args.idempotency_key,
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::core::constants::AppConstants;
    use crate::core::tools::args::EventSearchArgs;
    use crate::core::tools::{
        DomainTools, LedgerTools, ToolInvocation, ToolName, ToolRecord, test_tools,
    };
    use serde_json::{Value, json};
    use std::sync::Arc;

    async fn invoke(tool: ToolName, payload: Value) -> crate::core::error::ToolResult<ToolRecord> {
        let (_, tools) = test_tools();
        let call = ToolInvocation::from_payload(tool, payload.as_object().unwrap())?;
        tools.invoke(call).await
    }

    fn event(record: ToolRecord) -> crate::core::store::types::EventRecord {
        match record {
            ToolRecord::Event(e) => e,
            other => panic!("expected event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn expense_applies_defaults() {
        let e = event(
            invoke(
                ToolName::CreateExpense,
                json!({"amount": 30, "happened_at": "2024-01-10T12:00:00+08:00"}),
            )
            .await
            .unwrap(),
        );
        assert_eq!(e.event_type, "expense");
        assert_eq!(e.data["currency"], "CNY");
        assert_eq!(e.data["category"], "unknown");
        assert_eq!(e.source, "chat_text");
        assert_eq!(e.confidence, 0.8);
        assert_eq!(e.happened_at, "2024-01-10T12:00:00+08:00");
    }

    #[tokio::test]
    async fn expense_rejects_bad_fields() {
        let err = invoke(ToolName::CreateExpense, json!({"amount": -1}))
            .await
            .unwrap_err();
        assert_eq!(err.message, "amount must be > 0");
        let err = invoke(ToolName::CreateExpense, json!({"amount": 1, "category": "yachts"}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_param");
        let err = invoke(
            ToolName::CreateExpense,
            json!({"amount": 1, "happened_at": "2024-01-10T12:00:00"}),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), "invalid_time");
    }

    #[tokio::test]
    async fn meal_requires_items() {
        let err = invoke(ToolName::CreateMeal, json!({"meal_type": "lunch", "items": []}))
            .await
            .unwrap_err();
        assert_eq!(err.message, "items must be non-empty list");
        let err = invoke(ToolName::CreateMeal, json!({"meal_type": "brunch", "items": ["egg"]}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_param");
        let e = event(
            invoke(
                ToolName::CreateMeal,
                json!({"meal_type": "lunch", "items": [" noodles "]}),
            )
            .await
            .unwrap(),
        );
        assert_eq!(e.data["items"], json!(["noodles"]));
    }

    #[tokio::test]
    async fn mood_intensity_range() {
        let err = invoke(ToolName::CreateMood, json!({"mood": "happy", "intensity": 2}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_param");
        let e = event(invoke(ToolName::CreateMood, json!({"mood": "happy"})).await.unwrap());
        assert_eq!(e.data["intensity"], json!(0.5));
    }

    #[tokio::test]
    async fn lifelog_needs_text() {
        let err = invoke(ToolName::CreateLifelog, json!({"text": "  "}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_param");
        let err = invoke(ToolName::CreateLifelog, json!({"text": "x", "tags": "a"}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_tag");
    }

    #[tokio::test]
    async fn event_type_must_be_configured() {
        let mut constants = AppConstants::default();
        constants.event.types.retain(|t| t != "mood");
        let tools = LedgerTools::new(crate::core::store::test_store(), Arc::new(constants));
        let call =
            ToolInvocation::from_payload(ToolName::CreateMood, json!({"mood": "calm"}).as_object().unwrap())
                .unwrap();
        let err = tools.invoke(call).await.unwrap_err();
        assert_eq!(err.code(), "invalid_param");
        assert!(err.message.starts_with("type must be one of"));
    }

    #[tokio::test]
    async fn search_validates_and_filters() {
        let (_, tools) = test_tools();
        invoke_with(&tools, ToolName::CreateMood, json!({"mood": "happy"})).await;
        let lunch = event(
            invoke_with(
                &tools,
                ToolName::CreateExpense,
                json!({"amount": 30, "note": "午饭"}),
            )
            .await,
        );

        let hits = tools
            .search_events(EventSearchArgs {
                types: Some(vec!["expense".into()]),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].event_id, lunch.event_id);

        let err = tools
            .search_events(EventSearchArgs {
                types: Some(vec!["workout".into()]),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_param");

        let err = tools
            .search_events(EventSearchArgs {
                limit: Some(500),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.message, "limit must be in 1..200");

        let err = tools
            .search_events(EventSearchArgs {
                date_from: Some("yesterday".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_time");
    }

    async fn invoke_with(tools: &LedgerTools, tool: ToolName, payload: Value) -> ToolRecord {
        let call = ToolInvocation::from_payload(tool, payload.as_object().unwrap()).unwrap();
        tools.invoke(call).await.unwrap()
    }
}
