// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Projects a turn log into the alternating message list a model expects.
//!
//! Adjacent turns with the same role share one message, one content block
//! per turn, in log order. A user turn that follows tool results joins the
//! same user message after the result blocks, so roles strictly alternate.

use quill_core::{ContentBlock, ProviderMessage, Turn};
use serde_json::Value;

fn block_for(turn: &Turn) -> ContentBlock {
    match turn {
        Turn::User { content, .. } | Turn::AssistantText { content, .. } => ContentBlock::Text {
            text: content.clone(),
        },
        Turn::ToolCall {
            tool_invocation_id,
            tool_name,
            input,
            ..
        } => ContentBlock::ToolUse {
            id: tool_invocation_id.clone(),
            name: tool_name.clone(),
            input: Value::Object(input.clone()),
        },
        Turn::ToolResult {
            tool_invocation_id,
            output,
            is_error,
            ..
        } => ContentBlock::ToolResult {
            tool_use_id: tool_invocation_id.clone(),
            content: output.clone(),
            is_error: *is_error,
        },
    }
}

/// Builds model messages from `turns`. An empty log yields no messages.
///
/// A user turn never opens a second user message in a row. When it follows
/// tool results it is appended to their message as a text block after the
/// results, because the Messages API rejects consecutive user messages.
pub fn project(turns: &[Turn]) -> Vec<ProviderMessage> {
    let mut messages: Vec<ProviderMessage> = Vec::new();
    for turn in turns {
        let role = turn.role();
        let block = block_for(turn);
        match messages.last_mut() {
            Some(last) if last.role == role => last.content.push(block),
            _ => messages.push(ProviderMessage {
                role,
                content: vec![block],
            }),
        }
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use quill_core::Role;
    use serde_json::Map;

    #[test]
    fn empty_log_projects_to_nothing() {
        assert!(project(&[]).is_empty());
    }

    #[test]
    fn tool_exchange_projects_to_three_messages() {
        let turns = vec![
            Turn::user("x"),
            Turn::assistant_text("a"),
            Turn::tool_call("t1", "f", Map::new()),
            Turn::tool_result("t1", "ok", false),
        ];
        let messages = project(&turns);
        assert_eq!(messages.len(), 3);

        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, vec![ContentBlock::Text { text: "x".into() }]);

        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(
            messages[1].content,
            vec![
                ContentBlock::Text { text: "a".into() },
                ContentBlock::ToolUse {
                    id: "t1".into(),
                    name: "f".into(),
                    input: Value::Object(Map::new()),
                },
            ]
        );

        assert_eq!(messages[2].role, Role::User);
        assert_eq!(
            messages[2].content,
            vec![ContentBlock::ToolResult {
                tool_use_id: "t1".into(),
                content: "ok".into(),
                is_error: false,
            }]
        );
    }

    #[test]
    fn user_turn_after_results_joins_the_user_message() {
        let turns = vec![
            Turn::user("x"),
            Turn::tool_call("t1", "f", Map::new()),
            Turn::tool_result("t1", "ok", false),
            Turn::user("and now?"),
        ];
        let messages = project(&turns);
        assert_eq!(messages.len(), 3);
        assert!(matches!(
            messages[2].content[0],
            ContentBlock::ToolResult { .. }
        ));
        assert_eq!(
            messages[2].content[1],
            ContentBlock::Text {
                text: "and now?".into()
            }
        );
    }

    /// Generates logs of tool rounds: user text, then calls, then their results.
    fn arb_log() -> impl Strategy<Value = Vec<Turn>> {
        prop::collection::vec((any::<bool>(), 0usize..4), 0..6).prop_map(|rounds| {
            let mut turns = Vec::new();
            let mut next = 0;
            for (with_user, calls) in rounds {
                if with_user {
                    turns.push(Turn::user("u"));
                }
                turns.push(Turn::assistant_text("a"));
                let ids: Vec<String> = (0..calls)
                    .map(|_| {
                        next += 1;
                        format!("t{next}")
                    })
                    .collect();
                for id in &ids {
                    turns.push(Turn::tool_call(id.clone(), "f", Map::new()));
                }
                for id in &ids {
                    turns.push(Turn::tool_result(id.clone(), "ok", false));
                }
            }
            turns
        })
    }

    proptest! {
        #[test]
        fn message_count_equals_role_runs(turns in arb_log()) {
            let runs = turns
                .windows(2)
                .filter(|w| w[0].role() != w[1].role())
                .count()
                + usize::from(!turns.is_empty());
            let messages = project(&turns);
            prop_assert_eq!(messages.len(), runs);
            for pair in messages.windows(2) {
                prop_assert_ne!(pair[0].role, pair[1].role);
            }
        }

        #[test]
        fn every_block_is_kept_in_order(turns in arb_log()) {
            let flattened: Vec<ContentBlock> = project(&turns)
                .into_iter()
                .flat_map(|m| m.content)
                .collect();
            let expected: Vec<ContentBlock> = turns.iter().map(block_for).collect();
            prop_assert_eq!(flattened, expected);
        }

        #[test]
        fn results_follow_their_calls(turns in arb_log()) {
            let flattened: Vec<ContentBlock> = project(&turns)
                .into_iter()
                .flat_map(|m| m.content)
                .collect();
            for (result_at, block) in flattened.iter().enumerate() {
                if let ContentBlock::ToolResult { tool_use_id, .. } = block {
                    let call_at = flattened.iter().position(|b| {
                        matches!(b, ContentBlock::ToolUse { id, .. } if id == tool_use_id)
                    });
                    prop_assert!(call_at.is_some_and(|at| at < result_at));
                }
            }
        }
    }
}
