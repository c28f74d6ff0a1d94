use std::collections::BTreeMap;
use std::sync::Arc;

use parcel_core::{
    Failure, HeaderValue, Message, MessageBuilder, MessageError, MessageId, Payload, headers,
};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const REPLIES: &str = "orders.done";
const ERRORS: &str = "orders.errors";

const DEFAULT_ORDER: &str = r#"{
  "order_id": "A-1",
  "items": [
    { "sku": "apple", "qty": 2 },
    { "sku": "pear", "qty": 1 },
    { "sku": "plum", "qty": 0 }
  ]
}"#;

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct LineItem {
    sku: String,
    qty: u32,
}

#[derive(Debug, Deserialize)]
struct Order {
    order_id: String,
    items: Vec<LineItem>,
}

#[derive(Debug, Clone, PartialEq)]
enum Work {
    Order(Vec<LineItem>),
    Item(LineItem),
    Unit { sku: String, index: i64 },
    Failed(Failure),
    Aggregated(usize),
}

impl Payload for Work {
    fn is_failure(&self) -> bool {
        matches!(self, Work::Failed(_))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("sku {0} is out of stock")]
struct OutOfStock(String);

type Envelope = Arc<Message<Work>>;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// builder を別タスクに渡して build() する（modified フラグの受け渡しを確認）
async fn finish_elsewhere(builders: Vec<MessageBuilder<Work>>) -> Result<Vec<Envelope>, JoinError> {
    let (tx, mut rx) = mpsc::channel::<MessageBuilder<Work>>(builders.len().max(1));

    let finisher = tokio::spawn(async move {
        let mut built = Vec::new();
        while let Some(builder) = rx.recv().await {
            built.push(builder.build());
        }
        built
    });

    for builder in builders {
        if tx.send(builder).await.is_err() {
            break;
        }
    }
    drop(tx);

    finisher.await
}

/// order -> items. Each item is correlated to the order message's id.
fn split_order(order: &Envelope) -> Result<Vec<MessageBuilder<Work>>, MessageError> {
    let Work::Order(items) = order.payload() else {
        return Ok(Vec::new());
    };
    let size = items.len() as i64;

    let mut builders = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let payload = if item.qty == 0 {
            Work::Failed(Failure::new(OutOfStock(item.sku.clone())))
        } else {
            Work::Item(item.clone())
        };

        let builder = MessageBuilder::from_message_with_payload(order, payload)
            .push_sequence_details(order.headers().id(), index as i64 + 1, size)?;
        let builder = if builder.payload().is_failure() {
            builder.set_error_channel_name(ERRORS)
        } else {
            builder
        };
        builders.push(builder);
    }
    Ok(builders)
}

/// item -> one unit per quantity.
fn split_item(item: &Envelope) -> Result<Vec<MessageBuilder<Work>>, MessageError> {
    let Work::Item(line) = item.payload() else {
        return Ok(Vec::new());
    };
    let size = i64::from(line.qty);

    (1..=size)
        .map(|index| {
            let unit = Work::Unit {
                sku: line.sku.clone(),
                index,
            };
            MessageBuilder::from_message_with_payload(item, unit).push_sequence_details(
                item.headers().id(),
                index,
                size,
            )
        })
        .collect()
}

/// Release every complete group as one message carrying the parent's
/// correlation context.
fn aggregate(messages: &[Envelope]) -> Result<Vec<Envelope>, MessageError> {
    let mut groups: BTreeMap<MessageId, Vec<&Envelope>> = BTreeMap::new();
    for message in messages {
        if let Some(id) = message
            .headers()
            .correlation_id()
            .and_then(HeaderValue::as_id)
        {
            groups.entry(id).or_default().push(message);
        }
    }

    let mut released = Vec::new();
    for (correlation, group) in groups {
        let Some(first) = group
            .iter()
            .min_by_key(|message| message.headers().sequence_number())
        else {
            continue;
        };

        let expected = first.headers().sequence_size().unwrap_or(0);
        if group.len() as i64 != expected {
            warn!(%correlation, got = group.len(), expected, "group incomplete");
            continue;
        }

        let merged = MessageBuilder::from_message_with_payload(first, Work::Aggregated(group.len()))
            .remove_header(headers::ERROR_CHANNEL)
            .pop_sequence_details()?
            .build();
        released.push(merged);
    }
    Ok(released)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // 引数があれば注文 JSON として読む
    let raw = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_ORDER.to_string());
    let order: Order = serde_json::from_str(&raw)?;

    let order_msg = MessageBuilder::with_payload(Work::Order(order.items))
        .set_correlation_id(order.order_id)
        .set_sequence_number(1)
        .set_sequence_size(1)
        .set_reply_channel_name(REPLIES)
        .build();
    info!(headers = %serde_json::to_string(order_msg.headers())?, "order received");

    // split: order -> items -> units
    let items = finish_elsewhere(split_order(&order_msg)?).await?;
    let mut finished_items = Vec::new();
    let mut units = Vec::new();
    for item in &items {
        if let Work::Failed(failure) = item.payload() {
            warn!(error = %failure, channel = ?item.headers().error_channel(), "item failed");
            finished_items.push(Arc::clone(item));
        } else {
            units.extend(finish_elsewhere(split_item(item)?).await?);
        }
    }
    info!(items = items.len(), units = units.len(), "split finished");

    // aggregate: units -> items -> order
    finished_items.extend(aggregate(&units)?);
    let orders = aggregate(&finished_items)?;

    for done in &orders {
        let h = done.headers();
        info!(
            correlation_id = ?h.correlation_id(),
            sequence_number = ?h.sequence_number(),
            sequence_size = ?h.sequence_size(),
            reply_channel = ?h.reply_channel(),
            nested = h.sequence_details()?.len(),
            payload = ?done.payload(),
            "order aggregated"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(order_id: &str) -> Envelope {
        MessageBuilder::with_payload(Work::Order(Vec::new()))
            .set_correlation_id(order_id)
            .set_sequence_number(1)
            .set_sequence_size(1)
            .build()
    }

    fn units(parent: &Envelope, size: i64) -> Vec<Envelope> {
        (1..=size)
            .map(|index| {
                let unit = Work::Unit {
                    sku: "apple".to_string(),
                    index,
                };
                MessageBuilder::from_message_with_payload(parent, unit)
                    .push_sequence_details(parent.headers().id(), index, size)
                    .unwrap()
                    .set_error_channel_name(ERRORS)
                    .build()
            })
            .collect()
    }

    #[test]
    fn complete_group_is_released_with_the_parent_context() {
        let parent = order("A-1");

        let released = aggregate(&units(&parent, 3)).unwrap();

        assert_eq!(released.len(), 1);
        let merged = &released[0];
        assert_eq!(merged.payload(), &Work::Aggregated(3));
        assert_eq!(merged.headers().correlation_id(), Some(&HeaderValue::from("A-1")));
        assert_eq!(merged.headers().sequence_size(), Some(1));
        assert!(merged.headers().error_channel().is_none());
        assert!(merged.headers().sequence_details().unwrap().is_empty());
    }

    #[test]
    fn incomplete_group_is_held_back() {
        let mut messages = units(&order("A-1"), 2);
        let mut partial = units(&order("B-2"), 3);
        partial.pop();
        messages.extend(partial);

        let released = aggregate(&messages).unwrap();

        assert_eq!(released.len(), 1);
        assert_eq!(released[0].payload(), &Work::Aggregated(2));
        assert_eq!(released[0].headers().correlation_id(), Some(&HeaderValue::from("A-1")));
    }
}
