//! Tests for the editing store: history, the session state machine and saves.
mod common;
use common::*;
use flowstate::config::StoreConfig;
use flowstate::prelude::*;
use flowstate::store::Completion;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok, block_on};

#[cfg(test)]
mod history_tests {
    use super::*;

    #[test]
    fn test_delete_node_and_undo_restores_original() {
        block_on(async {
            let original = chart_ab(3);
            let repository = seeded(original.clone()).await;
            let mut store = session(&repository, original.id).await;

            let after = assert_ok!(store.dispatch(Intent::DeleteNode { id: "A".into() }));
            assert_eq!(after.nodes, vec![node("B")]);
            assert!(after.edges.is_empty());
            assert_eq!(after.version, 3);

            let undone = assert_ok!(store.undo());
            assert_eq!(*undone, original);
            // Exact restore, including list order.
            assert_eq!(undone.nodes, original.nodes);
            assert_eq!(undone.edges, original.edges);
            assert!(!store.is_dirty());

            let redone = assert_ok!(store.redo());
            assert_eq!(redone, after);
        });
    }

    #[test]
    fn test_dispatch_between_undo_and_redo_discards_redo_branch() {
        block_on(async {
            let chart = chart_ab(1);
            let repository = seeded(chart.clone()).await;
            let mut store = session(&repository, chart.id).await;

            assert_ok!(store.dispatch(Intent::RenameChart { name: "One".into() }));
            assert_ok!(store.undo());
            assert!(store.can_redo());
            assert_ok!(store.dispatch(Intent::RenameChart { name: "Two".into() }));
            assert!(!store.can_redo());

            let err = assert_err!(store.redo());
            assert!(err.is_noop());
            assert_eq!(store.chart().map(|c| c.name.clone()), Some("Two".into()));
        });
    }

    #[test]
    fn test_undo_at_boundary_is_noop() {
        block_on(async {
            let chart = chart_ab(1);
            let repository = seeded(chart.clone()).await;
            let mut store = session(&repository, chart.id).await;

            let err = assert_err!(store.undo());
            assert!(matches!(err, StoreError::NoOp(_)));
            assert_eq!(store.state(), SessionState::Ready);
        });
    }

    #[test]
    fn test_delete_selection_is_one_step() {
        block_on(async {
            let chart = chart_decision();
            let repository = seeded(chart.clone()).await;
            let mut store = session(&repository, chart.id).await;

            let after = assert_ok!(store.dispatch(Intent::DeleteSelection {
                nodes: vec!["check".into()],
                edges: vec!["check-yes".into()],
            }));
            assert_eq!(after.nodes.len(), 3);
            assert!(after.edges.is_empty());

            let undone = assert_ok!(store.undo());
            assert_eq!(*undone, chart);
            assert!(!store.can_undo());
        });
    }

    #[test]
    fn test_history_limit_drops_oldest_steps() {
        block_on(async {
            let chart = chart_ab(1);
            let repository = seeded(chart.clone()).await;
            let config = StoreConfig {
                history_limit: 2,
                ..Default::default()
            };
            let mut store = EditingStore::with_config(Arc::clone(&repository), config);
            assert_ok!(store.load(chart.id).await);

            for x in 1..=3 {
                assert_ok!(store.dispatch(Intent::MoveNode {
                    id: "A".into(),
                    position: Position::new(x as f64, 0.0),
                }));
            }
            assert_ok!(store.undo());
            assert_ok!(store.undo());
            assert!(store.undo().is_err());
            let position = store.chart().and_then(|c| c.node("A").map(|n| n.position));
            assert_eq!(position, Some(Position::new(1.0, 0.0)));
            assert!(store.is_dirty());
        });
    }

    /// Linear congruential generator so the sequence below is reproducible.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self, bound: usize) -> usize {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((self.0 >> 33) % bound as u64) as usize
        }
    }

    fn assert_exact(actual: &FlowChart, expected: &FlowChart) {
        assert_eq!(actual, expected);
        assert_eq!(actual.nodes, expected.nodes);
        assert_eq!(actual.edges, expected.edges);
    }

    fn random_intent(rng: &mut Lcg, chart: &FlowChart, fresh: &mut usize) -> Intent {
        let node_count = chart.nodes.len();
        let edge_count = chart.edges.len();
        let pick_node = |rng: &mut Lcg| chart.nodes[rng.next(node_count)].id.clone();
        match rng.next(8) {
            _ if node_count == 0 => {
                *fresh += 1;
                Intent::AddNode {
                    node: node(&format!("n{}", fresh)),
                }
            }
            0 => {
                *fresh += 1;
                let position = Position::new(rng.next(500) as f64, rng.next(500) as f64);
                Intent::AddNode {
                    node: Node::new(format!("n{}", fresh), "task", position),
                }
            }
            1 => {
                *fresh += 1;
                let source = pick_node(rng);
                let target = pick_node(rng);
                Intent::AddEdge {
                    edge: edge(&format!("e{}", fresh), &source, &target),
                }
            }
            2 => Intent::MoveNode {
                id: pick_node(rng),
                position: Position::new(rng.next(1000) as f64 - 500.0, rng.next(1000) as f64),
            },
            3 => Intent::UpdateNodeData {
                id: pick_node(rng),
                data: serde_json::json!({"weight": rng.next(100)}),
            },
            4 => Intent::DeleteNode { id: pick_node(rng) },
            5 if edge_count > 0 => Intent::DeleteEdge {
                id: chart.edges[rng.next(edge_count)].id.clone(),
            },
            6 => {
                let nodes = vec![pick_node(rng), pick_node(rng)];
                let edges = chart
                    .edges
                    .iter()
                    .filter(|_| rng.next(3) == 0)
                    .map(|e| e.id.clone())
                    .collect();
                Intent::DeleteSelection { nodes, edges }
            }
            _ => Intent::RenameChart {
                name: format!("Chart {}", rng.next(1000)),
            },
        }
    }

    #[test]
    fn test_mixed_sequence_stays_valid_and_replays_exactly() {
        block_on(async {
            let chart = chart_decision();
            let repository = seeded(chart.clone()).await;
            let config = StoreConfig {
                history_limit: 10_000,
                ..Default::default()
            };
            let mut store = EditingStore::with_config(Arc::clone(&repository), config);
            assert_ok!(store.load(chart.id).await);

            let mut rng = Lcg(0x5eed);
            let mut fresh = 0;
            let mut timeline = vec![Arc::new(chart)];
            let mut cursor = 0;

            for _ in 0..1500 {
                match rng.next(10) {
                    8 => match store.undo() {
                        Ok(undone) => {
                            cursor -= 1;
                            assert_exact(&undone, &timeline[cursor]);
                        }
                        Err(err) => {
                            assert!(err.is_noop());
                            assert_eq!(cursor, 0);
                        }
                    },
                    9 => match store.redo() {
                        Ok(redone) => {
                            cursor += 1;
                            assert_exact(&redone, &timeline[cursor]);
                        }
                        Err(err) => {
                            assert!(err.is_noop());
                            assert_eq!(cursor, timeline.len() - 1);
                        }
                    },
                    _ => {
                        let intent = random_intent(&mut rng, &timeline[cursor], &mut fresh);
                        let next = assert_ok!(store.dispatch(intent));
                        timeline.truncate(cursor + 1);
                        timeline.push(next);
                        cursor += 1;
                    }
                }
                let current = store.chart().expect("Session lost its chart");
                assert!(validate(&current).is_valid());
                assert_exact(&current, &timeline[cursor]);
            }

            // Walk the whole remaining history back to the loaded chart.
            while cursor > 0 {
                let undone = assert_ok!(store.undo());
                cursor -= 1;
                assert_exact(&undone, &timeline[cursor]);
            }
            assert!(!store.is_dirty());
        });
    }
}

#[cfg(test)]
mod validation_tests {
    use super::*;

    #[test]
    fn test_invalid_intent_leaves_working_copy_unchanged() {
        block_on(async {
            let chart = chart_ab(1);
            let repository = seeded(chart.clone()).await;
            let mut store = session(&repository, chart.id).await;

            let err = assert_err!(store.dispatch(Intent::AddEdge {
                edge: edge("A-Z", "A", "Z"),
            }));
            assert!(matches!(err, StoreError::Rejected(ref r) if r.len() == 1));

            let err = assert_err!(store.dispatch(Intent::MoveNode {
                id: "Z".into(),
                position: Position::default(),
            }));
            assert!(matches!(err, StoreError::Rejected(_)));

            assert_eq!(store.chart().as_deref(), Some(&chart));
            assert!(!store.can_undo());
            assert!(!store.is_dirty());
        });
    }

    #[test]
    fn test_store_validator_rejects_unknown_kinds() {
        block_on(async {
            let chart = chart_decision();
            let repository = seeded(chart.clone()).await;
            let mut store =
                EditingStore::new(Arc::clone(&repository)).with_validator(decision_validator());
            assert_ok!(store.load(chart.id).await);

            let err = assert_err!(store.dispatch(Intent::AddNode {
                node: Node::new("odd", "mystery", Position::default()),
            }));
            assert!(matches!(
                err,
                StoreError::Rejected(ref r)
                    if matches!(r.violations()[0], Violation::UnknownNodeKind { .. })
            ));
        });
    }

    #[test]
    fn test_non_finite_position_is_rejected_and_saving_still_works() {
        block_on(async {
            let chart = chart_ab(1);
            let store_of_record = seeded(chart.clone()).await;
            let repository = Arc::new(HttpFlowRepository::new(Arc::clone(&store_of_record)));
            let mut store = EditingStore::new(repository);
            assert_ok!(store.load(chart.id).await);

            let err = assert_err!(store.dispatch(Intent::MoveNode {
                id: "A".into(),
                position: Position::new(f64::NAN, 0.0),
            }));
            assert!(matches!(
                err,
                StoreError::Rejected(ref r)
                    if r.violations() == [Violation::NonFinitePosition { id: "A".into() }]
            ));
            let err = assert_err!(store.dispatch(Intent::AddNode {
                node: Node::new("far", "task", Position::new(f64::INFINITY, 1.0)),
            }));
            assert!(matches!(err, StoreError::Rejected(_)));
            assert_eq!(store.chart().as_deref(), Some(&chart));
            assert!(!store.can_undo());

            assert_ok!(store.dispatch(Intent::MoveNode {
                id: "A".into(),
                position: Position::new(12.0, 0.0),
            }));
            let saved = assert_ok!(store.save().await);
            assert_eq!(saved.version, 2);
        });
    }

    #[test]
    fn test_ids_from_the_loaded_chart_are_retired_after_delete() {
        block_on(async {
            let chart = chart_ab(1);
            let repository = seeded(chart.clone()).await;
            let mut store = session(&repository, chart.id).await;

            assert_ok!(store.dispatch(Intent::DeleteEdge { id: "A-B".into() }));
            let err = assert_err!(store.dispatch(Intent::AddEdge {
                edge: edge("A-B", "B", "A"),
            }));
            assert!(matches!(
                err,
                StoreError::Rejected(ref r)
                    if r.violations() == [Violation::RetiredId { id: "A-B".into() }]
            ));
        });
    }
}

#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    #[test]
    fn test_load_unknown_chart_enters_error() {
        block_on(async {
            let chart = chart_ab(1);
            let repository = seeded(chart.clone()).await;
            let mut store = EditingStore::new(Arc::clone(&repository));

            let err = assert_err!(store.load(uuid::Uuid::new_v4()).await);
            assert!(matches!(
                err,
                StoreError::Repository(RepositoryError::NotFound { .. })
            ));
            assert_eq!(store.state(), SessionState::Error);
            assert!(store.last_error().is_some());

            let err = assert_err!(store.dispatch(Intent::RenameChart { name: "x".into() }));
            assert!(matches!(
                err,
                StoreError::NotReady {
                    state: SessionState::Error
                }
            ));

            // A fresh load recovers the session.
            assert_ok!(store.load(chart.id).await);
            assert_eq!(store.state(), SessionState::Ready);
            assert!(store.last_error().is_none());
        });
    }

    #[test]
    fn test_operations_are_rejected_while_saving() {
        block_on(async {
            let chart = chart_ab(1);
            let repository = seeded(chart.clone()).await;
            let mut store = session(&repository, chart.id).await;
            assert_ok!(store.dispatch(Intent::RenameChart { name: "Saving".into() }));

            let ticket = assert_ok!(store.begin_save());
            assert_eq!(store.state(), SessionState::Saving);
            for err in [
                store.dispatch(Intent::DeleteNode { id: "A".into() }).unwrap_err(),
                store.undo().unwrap_err(),
                store.redo().unwrap_err(),
                store.begin_save().unwrap_err(),
            ] {
                assert!(matches!(
                    err,
                    StoreError::NotReady {
                        state: SessionState::Saving
                    }
                ));
            }

            let result = ticket.submit(repository.as_ref()).await;
            assert_eq!(assert_ok!(store.finish_save(ticket, result)), Completion::Applied);
            assert_eq!(store.state(), SessionState::Ready);
            assert_eq!(store.chart().map(|c| c.version), Some(2));
            assert!(!store.is_dirty());
        });
    }

    #[test]
    fn test_replacing_load_discards_the_first_response() {
        block_on(async {
            let first = chart_ab(1);
            let second = chart_decision();
            let repository = seeded(first.clone()).await;
            repository.insert(second.clone()).await;
            let mut store = EditingStore::new(Arc::clone(&repository));

            let stale = store.begin_load(first.id);
            let current = store.begin_load(second.id);
            let stale_result = stale.submit(repository.as_ref()).await;
            let current_result = current.submit(repository.as_ref()).await;

            assert_eq!(
                assert_ok!(store.finish_load(stale, stale_result)),
                Completion::Discarded
            );
            assert_eq!(store.state(), SessionState::Loading);
            assert_eq!(
                assert_ok!(store.finish_load(current, current_result)),
                Completion::Applied
            );
            assert_eq!(store.chart().as_deref(), Some(&second));
        });
    }

    #[test]
    fn test_abandoned_load_returns_to_idle() {
        block_on(async {
            let chart = chart_ab(1);
            let repository = seeded(chart.clone()).await;
            let mut store = EditingStore::new(Arc::clone(&repository));

            let ticket = store.begin_load(chart.id);
            store.abandon();
            assert_eq!(store.state(), SessionState::Idle);

            let result = ticket.submit(repository.as_ref()).await;
            assert_eq!(
                assert_ok!(store.finish_load(ticket, result)),
                Completion::Discarded
            );
            assert!(store.chart().is_none());
        });
    }

    #[test]
    fn test_abandoned_save_surfaces_as_conflict_later() {
        block_on(async {
            let chart = chart_ab(1);
            let repository = seeded(chart.clone()).await;
            let mut store = session(&repository, chart.id).await;
            assert_ok!(store.dispatch(Intent::RenameChart { name: "Abandoned".into() }));

            let ticket = assert_ok!(store.begin_save());
            store.abandon();
            assert_eq!(store.state(), SessionState::Ready);

            // The request still reaches the server.
            let result = ticket.submit(repository.as_ref()).await;
            assert_eq!(
                assert_ok!(store.finish_save(ticket, result)),
                Completion::Discarded
            );
            assert_eq!(store.chart().map(|c| c.version), Some(1));
            assert!(store.is_dirty());

            let err = assert_err!(store.save().await);
            assert!(err.is_conflict());
            assert_eq!(store.state(), SessionState::Conflict);
        });
    }

    #[test]
    fn test_close_ends_the_session() {
        block_on(async {
            let chart = chart_ab(1);
            let repository = seeded(chart.clone()).await;
            let mut store = session(&repository, chart.id).await;
            store.close();
            assert_eq!(store.state(), SessionState::Idle);
            assert!(store.chart().is_none());
            assert!(!store.is_dirty());
        });
    }
}

#[cfg(test)]
mod save_tests {
    use super::*;

    #[test]
    fn test_save_adopts_server_version() {
        block_on(async {
            let chart = chart_ab(3);
            let repository = seeded(chart.clone()).await;
            let mut store = session(&repository, chart.id).await;

            assert_ok!(store.dispatch(Intent::AddNode { node: node("C") }));
            assert!(store.is_dirty());
            let saved = assert_ok!(store.save().await);
            assert_eq!(saved.version, 4);
            assert!(!store.is_dirty());
            assert!(store.can_undo());

            let stored = repository.get(chart.id).await.expect("Chart missing from store");
            assert_eq!(stored, *saved);

            // Undoing past the save point makes the session dirty again.
            assert_ok!(store.undo());
            assert!(store.is_dirty());
            assert_eq!(store.chart().map(|c| c.version), Some(4));
        });
    }

    #[test]
    fn test_patch_mode_sends_only_the_diff() {
        block_on(async {
            let chart = chart_decision();
            let repository = seeded(chart.clone()).await;
            let config = StoreConfig {
                save_mode: SaveMode::Patch,
                ..Default::default()
            };
            let mut store = EditingStore::with_config(Arc::clone(&repository), config);
            assert_ok!(store.load(chart.id).await);

            assert_ok!(store.dispatch(Intent::DeleteNode { id: "no".into() }));
            assert_ok!(store.dispatch(Intent::UpdateNodeData {
                id: "check".into(),
                data: serde_json::json!({"question": "Ship it?"}),
            }));
            let ticket = assert_ok!(store.begin_save());
            assert_eq!(ticket.patches.len(), 3);

            let result = ticket.submit(repository.as_ref()).await;
            assert_ok!(store.finish_save(ticket, result));
            let stored = repository.get(chart.id).await.expect("Chart missing from store");
            assert_eq!(stored.version, 2);
            assert_eq!(store.chart().as_deref(), Some(&stored));

            // A second save diffs against the acknowledged chart.
            assert_ok!(store.dispatch(Intent::RenameChart { name: "Shipped".into() }));
            let ticket = assert_ok!(store.begin_save());
            assert_eq!(
                ticket.patches,
                vec![ChartPatch::Rename {
                    name: "Shipped".into()
                }]
            );
            store.abandon();
        });
    }

    #[test]
    fn test_two_sessions_race_and_second_sees_conflict() {
        block_on(async {
            let chart = chart_ab(7);
            let repository = seeded(chart.clone()).await;
            let mut first = session(&repository, chart.id).await;
            let mut second = session(&repository, chart.id).await;

            assert_ok!(first.dispatch(Intent::RenameChart { name: "First".into() }));
            let winner = assert_ok!(first.save().await);
            assert_eq!(winner.version, 8);

            assert_ok!(second.dispatch(Intent::DescribeChart {
                description: "Second".into(),
            }));
            let err = assert_err!(second.save().await);
            match err {
                StoreError::Repository(RepositoryError::VersionConflict { expected, current }) => {
                    assert_eq!(expected, 7);
                    assert_eq!(*current, *winner);
                }
                other => panic!("Expected VersionConflict, got {:?}", other),
            }
            assert_eq!(second.state(), SessionState::Conflict);
            assert_eq!(second.conflict().map(|c| c.version), Some(8));
            // Local edits are kept while in conflict.
            assert_eq!(
                second.chart().map(|c| c.description.clone()),
                Some("Second".into())
            );
            let err = assert_err!(second.dispatch(Intent::RenameChart { name: "x".into() }));
            assert!(matches!(
                err,
                StoreError::NotReady {
                    state: SessionState::Conflict
                }
            ));
        });
    }

    #[test]
    fn test_resolve_by_reload_adopts_server_chart() {
        block_on(async {
            let chart = chart_ab(1);
            let repository = seeded(chart.clone()).await;
            let mut first = session(&repository, chart.id).await;
            let mut second = session(&repository, chart.id).await;

            assert_ok!(first.dispatch(Intent::RenameChart { name: "First".into() }));
            let winner = assert_ok!(first.save().await);
            assert_ok!(second.dispatch(Intent::DeleteNode { id: "A".into() }));
            assert_err!(second.save().await);

            let reloaded = assert_ok!(second.resolve(Resolution::Reload));
            assert_eq!(reloaded, winner);
            assert_eq!(second.state(), SessionState::Ready);
            assert!(!second.is_dirty());
            assert!(!second.can_undo());
            assert!(second.conflict().is_none());

            // Ids seen earlier in the session stay retired.
            assert_ok!(second.dispatch(Intent::DeleteNode { id: "A".into() }));
            let err = assert_err!(second.dispatch(Intent::AddNode { node: node("A") }));
            assert!(matches!(err, StoreError::Rejected(_)));
        });
    }

    #[test]
    fn test_resolve_by_overwrite_keeps_local_edits() {
        block_on(async {
            let chart = chart_ab(1);
            let repository = seeded(chart.clone()).await;
            let mut first = session(&repository, chart.id).await;
            let mut second = session(&repository, chart.id).await;

            assert_ok!(first.dispatch(Intent::RenameChart { name: "First".into() }));
            assert_ok!(first.save().await);
            assert_ok!(second.dispatch(Intent::RenameChart { name: "Second".into() }));
            assert_err!(second.save().await);

            let kept = assert_ok!(second.resolve(Resolution::Overwrite));
            assert_eq!(kept.name, "Second");
            assert_eq!(kept.version, 2);
            assert!(second.is_dirty());

            let saved = assert_ok!(second.save().await);
            assert_eq!(saved.version, 3);
            assert_eq!(
                repository.get(chart.id).await.map(|c| c.name),
                Some("Second".into())
            );
        });
    }

    #[test]
    fn test_rejected_save_returns_to_ready() {
        block_on(async {
            let chart = chart_decision();
            let store_of_record = Arc::new(MemoryStore::new().with_validator(decision_validator()));
            store_of_record.insert(chart.clone()).await;
            let repository = Arc::new(HttpFlowRepository::new(Arc::clone(&store_of_record)));
            let mut store = EditingStore::new(repository);
            assert_ok!(store.load(chart.id).await);

            assert_ok!(store.dispatch(Intent::AddNode {
                node: Node::new("odd", "mystery", Position::default()),
            }));
            let err = assert_err!(store.save().await);
            assert!(matches!(
                err,
                StoreError::Repository(RepositoryError::Validation(_))
            ));
            assert_eq!(store.state(), SessionState::Ready);
            assert!(store.last_error().is_some());

            // The caller fixes the chart and retries.
            assert_ok!(store.undo());
            assert_ok!(store.dispatch(Intent::AddNode {
                node: Node::new("fine", "task", Position::default()),
            }));
            let saved = assert_ok!(store.save().await);
            assert_eq!(saved.version, 2);
            assert!(store.last_error().is_none());
        });
    }
}

#[cfg(test)]
mod subscription_tests {
    use super::*;

    #[test]
    fn test_subscribers_see_every_state_change() {
        block_on(async {
            let chart = chart_ab(1);
            let repository = seeded(chart.clone()).await;
            let mut store = EditingStore::new(Arc::clone(&repository));
            let mut view = store.subscribe();
            assert_eq!(view.borrow().state, SessionState::Idle);

            let ticket = store.begin_load(chart.id);
            assert!(view.has_changed().unwrap_or(false));
            assert_eq!(view.borrow_and_update().state, SessionState::Loading);

            let result = ticket.submit(repository.as_ref()).await;
            assert_ok!(store.finish_load(ticket, result));
            assert_ok!(store.dispatch(Intent::DeleteNode { id: "B".into() }));

            let snapshot = view.borrow_and_update().clone();
            assert_eq!(snapshot.state, SessionState::Ready);
            assert!(snapshot.dirty);
            assert!(snapshot.can_undo);
            assert!(!snapshot.can_redo);
            assert_eq!(snapshot.chart.map(|c| c.nodes.len()), Some(1));
        });
    }
}
