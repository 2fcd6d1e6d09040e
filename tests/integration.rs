//! Integration tests for Flowstate
//!
//! End-to-end sessions: editor surface, editing store, HTTP client and the
//! in-process store of record working together.
//!
mod common;
use common::*;
use flowstate::prelude::*;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok, block_on};

#[cfg(test)]
mod integration_tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> FlowConfig {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        FlowConfig::from_lookup(|key| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        })
        .expect("Failed to build config")
    }

    #[test]
    fn test_full_session_over_http() {
        block_on(async {
            let store_of_record = Arc::new(MemoryStore::new());
            let created = store_of_record.create("Release process").await;
            let config = config(&[("FLOWSTATE_SAVE_MODE", "patch")]);
            let repository: Arc<dyn FlowRepository> = Arc::new(HttpFlowRepository::with_config(
                Arc::clone(&store_of_record),
                config.client.clone(),
            ));

            let mut store = EditingStore::with_config(repository, config.store);
            assert_ok!(store.load(created.id).await);
            let editor = EditorSurface::new(&store, Role::Creator);

            for kind in ["start", "end"] {
                assert_ok!(editor.apply(
                    &mut store,
                    Gesture::DropNode {
                        kind: kind.into(),
                        at: Position::default(),
                        data: serde_json::Value::Null,
                    }
                ));
            }
            let canvas = editor.canvas().expect("Canvas should show a chart");
            let ids: Vec<NodeId> = canvas.nodes.iter().map(|n| n.id.clone()).collect();
            assert_ok!(editor.apply(
                &mut store,
                Gesture::Connect {
                    from: ids[0].clone(),
                    from_handle: None,
                    to: ids[1].clone(),
                    to_handle: None,
                }
            ));
            assert_ok!(editor.apply(
                &mut store,
                Gesture::RenameChart {
                    name: "Release process v2".into()
                }
            ));

            let saved = assert_ok!(store.save().await);
            assert_eq!(saved.version, 2);
            let stored = store_of_record
                .get(created.id)
                .await
                .expect("Chart missing from store");
            assert_eq!(stored, *saved);
            assert_eq!(stored.name, "Release process v2");
            assert_eq!(stored.edges.len(), 1);
            assert!(!editor.view().dirty);

            // Deleting a node takes its edge along, on both sides.
            assert_ok!(store.dispatch(Intent::DeleteNode { id: ids[0].clone() }));
            let saved = assert_ok!(store.save().await);
            assert_eq!(saved.version, 3);
            assert!(saved.edges.is_empty());
            assert!(validate(&saved).is_valid());
        });
    }

    #[test]
    fn test_concurrent_editors_never_lose_updates() {
        block_on(async {
            let chart = chart_decision();
            let store_of_record = seeded(chart.clone()).await;
            let repository = Arc::new(HttpFlowRepository::new(Arc::clone(&store_of_record)));

            let mut alice = EditingStore::new(Arc::clone(&repository));
            let mut bob = EditingStore::new(Arc::clone(&repository));
            assert_ok!(alice.load(chart.id).await);
            assert_ok!(bob.load(chart.id).await);

            assert_ok!(alice.dispatch(Intent::DeleteNode { id: "no".into() }));
            assert_ok!(bob.dispatch(Intent::MoveNode {
                id: "no".into(),
                position: Position::new(300.0, 300.0),
            }));

            assert_ok!(alice.save().await);
            let err = assert_err!(bob.save().await);
            assert!(err.is_conflict());

            let server = bob.conflict().expect("Conflict should carry the server chart");
            assert!(!server.contains_node("no"));
            assert_ok!(bob.resolve(Resolution::Reload));
            assert_eq!(bob.chart(), alice.chart());
        });
    }

    #[test]
    fn test_undo_redo_survive_a_save() {
        block_on(async {
            let chart = chart_ab(1);
            let store_of_record = seeded(chart.clone()).await;
            let mut store = session(&store_of_record, chart.id).await;

            assert_ok!(store.dispatch(Intent::DeleteNode { id: "A".into() }));
            assert_ok!(store.save().await);
            let restored = assert_ok!(store.undo());
            assert!(restored.same_content(&chart));
            assert_eq!(restored.version, 2);

            let saved = assert_ok!(store.save().await);
            assert_eq!(saved.version, 3);
            assert!(
                store_of_record
                    .get(chart.id)
                    .await
                    .is_some_and(|c| c.same_content(&chart))
            );
        });
    }
}
