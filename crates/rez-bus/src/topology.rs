// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use rez_config::TopicArns;

use crate::message::MessageType;

/// Static topic topology.  One topic per message class; the mapping below is
/// the entire routing layer.
///
/// `Scheduled` triggers are carried on the web-action topic (the scheduler
/// publishes a fully-formed web-action or notify envelope), and
/// `HelloWorld` probes ride the notification topic — neither class earns a
/// dedicated pair.
#[derive(Debug, Clone)]
pub struct Topology {
    topics: TopicArns,
}

impl Topology {
    pub fn new(topics: TopicArns) -> Self {
        Self { topics }
    }

    /// The destination topic ARN for a message class.
    pub fn topic_for(&self, message_type: MessageType) -> &str {
        match message_type {
            MessageType::WebAction | MessageType::Scheduled => &self.topics.web_action,
            MessageType::Notify | MessageType::HelloWorld => &self.topics.notify,
            MessageType::AgentResponse => &self.topics.agent_response,
            MessageType::ScheduleCreation => &self.topics.schedule_creation,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn topology() -> Topology {
        Topology::new(TopicArns::default())
    }

    #[test]
    fn web_action_routes_to_web_action_topic() {
        let t = topology();
        assert!(t.topic_for(MessageType::WebAction).contains("web-actions"));
    }

    #[test]
    fn scheduled_shares_web_action_topic() {
        let t = topology();
        assert_eq!(
            t.topic_for(MessageType::Scheduled),
            t.topic_for(MessageType::WebAction)
        );
    }

    #[test]
    fn hello_world_rides_notify_topic() {
        let t = topology();
        assert_eq!(
            t.topic_for(MessageType::HelloWorld),
            t.topic_for(MessageType::Notify)
        );
    }

    #[test]
    fn dedicated_classes_get_distinct_topics() {
        let t = topology();
        let arns = [
            t.topic_for(MessageType::WebAction),
            t.topic_for(MessageType::Notify),
            t.topic_for(MessageType::AgentResponse),
            t.topic_for(MessageType::ScheduleCreation),
        ];
        for (i, a) in arns.iter().enumerate() {
            for b in &arns[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
