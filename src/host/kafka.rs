//! Kafka and mail seams handed out by the host.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use serde_json::Value;

use super::HostError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KafkaMessage {
    pub key: Option<Value>,
    pub value: Option<Value>,
    pub headers: BTreeMap<String, String>,
    pub partition: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProduceArgs {
    pub cluster: Option<String>,
    pub topic: Option<String>,
    pub messages: Vec<KafkaMessage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProducedMessage {
    pub key: Option<Value>,
    pub value: Option<Value>,
    pub headers: BTreeMap<String, String>,
    pub partition: i32,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProduceResult {
    pub cluster: String,
    pub topic: String,
    pub messages: Vec<ProducedMessage>,
}

pub trait KafkaClient: Send + Sync {
    fn produce(&self, args: ProduceArgs) -> Result<ProduceResult, HostError>;
}

/// Keeps produced records in memory, one log per topic and partition.
#[derive(Default)]
pub struct InMemoryKafka {
    cluster: String,
    default_topic: Option<String>,
    logs: Mutex<HashMap<(String, i32), Vec<ProducedMessage>>>,
}

impl InMemoryKafka {
    pub fn new(cluster: &str) -> Self {
        InMemoryKafka {
            cluster: cluster.to_string(),
            ..Default::default()
        }
    }

    /// Topic used when a produce call names none.
    pub fn with_default_topic(mut self, topic: &str) -> Self {
        self.default_topic = Some(topic.to_string());
        self
    }

    /// Records of `topic`, all partitions, in offset order per partition.
    pub fn records(&self, topic: &str) -> Vec<ProducedMessage> {
        let logs = self.logs.lock().unwrap_or_else(|p| p.into_inner());
        let mut partitions: Vec<_> = logs.iter().filter(|((t, _), _)| t == topic).collect();
        partitions.sort_by_key(|((_, p), _)| *p);
        partitions.into_iter().flat_map(|(_, log)| log.iter().cloned()).collect()
    }
}

impl KafkaClient for InMemoryKafka {
    fn produce(&self, args: ProduceArgs) -> Result<ProduceResult, HostError> {
        if let Some(cluster) = &args.cluster {
            if !self.cluster.is_empty() && cluster != &self.cluster {
                return Err(HostError::Kafka(format!("kafka cluster '{}' not found", cluster)));
            }
        }
        let topic = args
            .topic
            .or_else(|| self.default_topic.clone())
            .ok_or_else(|| HostError::Kafka("no topic given".to_string()))?;
        let mut logs = self.logs.lock().unwrap_or_else(|p| p.into_inner());
        let mut produced = Vec::with_capacity(args.messages.len());
        for message in args.messages {
            let partition = message.partition.unwrap_or(0);
            if partition < 0 {
                return Err(HostError::Kafka(format!("invalid partition {}", partition)));
            }
            let log = logs.entry((topic.clone(), partition)).or_default();
            let record = ProducedMessage {
                key: message.key,
                value: message.value,
                headers: message.headers,
                partition,
                offset: log.len() as i64,
            };
            log.push(record.clone());
            produced.push(record);
        }
        log::debug!("produced {} message(s) to {}", produced.len(), topic);
        Ok(ProduceResult {
            cluster: self.cluster.clone(),
            topic,
            messages: produced,
        })
    }
}

/// One outgoing mail as scripts describe it.
#[derive(Debug, Clone, PartialEq)]
pub struct Mail {
    pub url: String,
    pub message: Value,
    pub auth: Option<Value>,
}

pub trait MailSender: Send + Sync {
    fn send(&self, mail: Mail) -> Result<(), HostError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn offsets_grow_per_partition() {
        let kafka = InMemoryKafka::new("local").with_default_topic("orders");
        let message = |partition| KafkaMessage {
            value: Some(json!("x")),
            partition,
            ..Default::default()
        };
        let result = kafka
            .produce(ProduceArgs {
                messages: vec![message(None), message(None), message(Some(1))],
                ..Default::default()
            })
            .unwrap();
        let offsets: Vec<_> = result.messages.iter().map(|m| (m.partition, m.offset)).collect();
        assert_eq!(offsets, vec![(0, 0), (0, 1), (1, 0)]);
        assert_eq!(kafka.records("orders").len(), 3);
    }

    #[test]
    fn unknown_cluster_fails() {
        let kafka = InMemoryKafka::new("local");
        let err = kafka
            .produce(ProduceArgs {
                cluster: Some("other".into()),
                topic: Some("t".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(err.to_string().contains("other"));
    }
}
