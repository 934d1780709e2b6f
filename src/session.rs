//! Turn handling for one chat session
//!
//! Each turn loads the persisted [`SessionState`], applies a pure
//! navigation transition, fetches (or generates) the menu for the new
//! position and only then persists. A failed turn therefore never commits
//! navigation towards a child whose menu could not be produced.

use crate::db::{Node, NodeId};
use crate::generator::ContentGenerator;
use crate::navigation::{transition, NavEvent, SessionState, TransitionResult};
use crate::store::{load_json, store_json, KeyValueStore, Namespace, NodeStore, StorageError};
use crate::tree::{TreeCache, TreeError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const ROOT_PROMPT: &str = "Where would you like to begin?";
const TRY_AGAIN_MESSAGE: &str = "Something went wrong while exploring. Please try again.";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl SessionError {
    /// Whether the same turn may succeed if the user simply repeats it
    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::Tree(TreeError::Generation(e)) => e.is_retryable(),
            SessionError::Storage(_) | SessionError::Tree(TreeError::Storage(_)) => true,
        }
    }
}

/// Inbound events from the chat transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent {
    /// Start or restart from the root
    Start,
    SelectChild(NodeId),
    GoBack,
    /// Dismiss the interactive menu; tree and session are untouched
    Close,
}

/// What the transport should render
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnResponse {
    Menu(Menu),
    Closed,
    TryAgain { message: String },
}

impl TurnResponse {
    fn try_again() -> Self {
        TurnResponse::TryAgain {
            message: TRY_AGAIN_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Menu {
    /// Alternates by depth so adjacent levels render distinctly
    pub menu_id: &'static str,
    pub depth: usize,
    /// Heading shown above the choices
    pub prompt: String,
    /// `None` at the root
    pub current: Option<Node>,
    pub choices: Vec<Node>,
    pub can_go_back: bool,
}

/// Bookkeeping for an open interactive menu, kept under
/// [`Namespace::Conversation`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuDialogue {
    pub menu_id: String,
    pub opened_at: DateTime<Utc>,
    pub turns: u64,
}

pub struct SessionController<S, G> {
    tree: TreeCache<S, G>,
}

impl<S, G> SessionController<S, G>
where
    S: NodeStore + KeyValueStore,
    G: ContentGenerator,
{
    pub fn new(tree: TreeCache<S, G>) -> Self {
        Self { tree }
    }

    fn store(&self) -> &S {
        self.tree.store()
    }

    /// Handle one turn. Never fails: errors are logged and reported to the
    /// user as a retryable response with the session left as it was.
    pub async fn handle(
        &self,
        session_key: &str,
        requester: Option<&str>,
        event: TurnEvent,
    ) -> TurnResponse {
        match self.try_handle(session_key, requester, event).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    session = session_key,
                    ?event,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Turn failed"
                );
                TurnResponse::try_again()
            }
        }
    }

    async fn try_handle(
        &self,
        session_key: &str,
        requester: Option<&str>,
        event: TurnEvent,
    ) -> Result<TurnResponse, SessionError> {
        let requested = match event {
            TurnEvent::Close => {
                self.close_dialogue(session_key).await?;
                return Ok(TurnResponse::Closed);
            }
            TurnEvent::Start => NavEvent::Reset,
            TurnEvent::GoBack => NavEvent::GoBack,
            TurnEvent::SelectChild(child_id) => NavEvent::SelectChild { child_id },
        };

        let state = self.load_state(session_key).await?;
        let accepted = match requested {
            NavEvent::SelectChild { child_id } => self.is_current_choice(&state, child_id).await?,
            NavEvent::GoBack | NavEvent::Reset => true,
        };

        let result = if accepted {
            transition(&state, requested)
        } else {
            tracing::warn!(
                session = session_key,
                ?requested,
                current = ?state.current_node_id,
                "Ignoring stale selection"
            );
            TransitionResult {
                new_state: state,
                changed: false,
            }
        };

        let menu = self.render(&result.new_state, requester).await?;

        self.touch_dialogue(session_key, menu.menu_id).await?;
        if result.changed {
            store_json(
                self.store(),
                &Namespace::Session.key(session_key),
                &result.new_state,
            )
            .await?;
        }

        tracing::info!(
            session = session_key,
            ?event,
            depth = menu.depth,
            choices = menu.choices.len(),
            "Turn handled"
        );
        Ok(TurnResponse::Menu(menu))
    }

    async fn load_state(&self, session_key: &str) -> Result<SessionState, StorageError> {
        Ok(load_json(self.store(), &Namespace::Session.key(session_key))
            .await?
            .unwrap_or_default())
    }

    /// A selection is only valid for a child of the current node
    async fn is_current_choice(
        &self,
        state: &SessionState,
        child_id: NodeId,
    ) -> Result<bool, StorageError> {
        Ok(self
            .store()
            .find(child_id)
            .await?
            .is_some_and(|node| node.parent_id == state.current_node_id))
    }

    async fn render(
        &self,
        state: &SessionState,
        requester: Option<&str>,
    ) -> Result<Menu, SessionError> {
        let current = match state.current_node_id {
            Some(id) => self.store().find(id).await?,
            None => None,
        };
        let choices = self
            .tree
            .get_or_generate_children(state.current_node_id, requester)
            .await?;

        let prompt = match &current {
            Some(node) => format!("{}: what comes next?", node.label()),
            None => ROOT_PROMPT.to_string(),
        };

        Ok(Menu {
            menu_id: state.menu_identity().menu_id(),
            depth: state.depth(),
            prompt,
            current,
            choices,
            can_go_back: state.can_go_back(),
        })
    }

    async fn touch_dialogue(&self, session_key: &str, menu_id: &str) -> Result<(), StorageError> {
        let key = Namespace::Conversation.key(session_key);
        let dialogue = match load_json::<MenuDialogue, _>(self.store(), &key).await? {
            Some(existing) => MenuDialogue {
                menu_id: menu_id.to_string(),
                turns: existing.turns + 1,
                ..existing
            },
            None => MenuDialogue {
                menu_id: menu_id.to_string(),
                opened_at: Utc::now(),
                turns: 1,
            },
        };
        store_json(self.store(), &key, &dialogue).await
    }

    async fn close_dialogue(&self, session_key: &str) -> Result<(), StorageError> {
        self.store()
            .delete(&Namespace::Conversation.key(session_key))
            .await?;
        tracing::info!(session = session_key, "Menu closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::GenerationError;
    use crate::navigation::MenuIdentity;
    use crate::testing::{FlakyStorage, MockGenerator};
    use std::sync::Arc;

    type TestController = SessionController<Arc<FlakyStorage>, Arc<MockGenerator>>;

    fn controller() -> (TestController, Arc<FlakyStorage>, Arc<MockGenerator>) {
        let store = Arc::new(FlakyStorage::new());
        let generator = Arc::new(MockGenerator::new());
        let tree = TreeCache::new(store.clone(), generator.clone()).with_root_seeds(vec![
            "Fire".to_string(),
            "Water".to_string(),
            "Earth".to_string(),
            "Air".to_string(),
        ]);
        (SessionController::new(tree), store, generator)
    }

    fn menu(response: TurnResponse) -> Menu {
        match response {
            TurnResponse::Menu(menu) => menu,
            other => panic!("expected menu, got {other:?}"),
        }
    }

    fn child<'a>(menu: &'a Menu, name: &str) -> &'a Node {
        menu.choices.iter().find(|n| n.name == name).unwrap()
    }

    async fn saved_state(store: &FlakyStorage) -> Option<SessionState> {
        load_json(store, &Namespace::Session.key("chat")).await.unwrap()
    }

    #[tokio::test]
    async fn test_start_renders_seeded_root() {
        let (controller, store, generator) = controller();
        let root = menu(controller.handle("chat", Some("u1"), TurnEvent::Start).await);

        assert_eq!(root.menu_id, "discover-a");
        assert_eq!(root.depth, 0);
        assert!(root.current.is_none());
        assert_eq!(root.prompt, ROOT_PROMPT);
        assert!(!root.can_go_back);
        assert_eq!(root.choices.len(), 4);
        assert_eq!(generator.call_count(), 0);
        assert_eq!(saved_state(&store).await, Some(SessionState::default()));
    }

    #[tokio::test]
    async fn test_select_then_back() {
        let (controller, store, generator) = controller();
        let root = menu(controller.handle("chat", None, TurnEvent::Start).await);
        let water = child(&root, "Water").clone();

        generator.queue_names(&["Steam", "Ice"]);
        let at_water = menu(
            controller
                .handle("chat", Some("u1"), TurnEvent::SelectChild(water.id))
                .await,
        );
        assert_eq!(at_water.menu_id, "discover-b");
        assert_eq!(at_water.depth, 1);
        assert_eq!(at_water.current.as_ref(), Some(&water));
        assert_eq!(at_water.prompt, "Water: what comes next?");
        assert!(at_water.can_go_back);
        assert_eq!(generator.calls()[0], "Water");

        let steam = child(&at_water, "Steam").clone();
        assert_eq!(steam.discovered_by.as_deref(), Some("u1"));
        generator.queue_names(&["Cloud"]);
        let at_steam = menu(
            controller
                .handle("chat", None, TurnEvent::SelectChild(steam.id))
                .await,
        );
        assert_eq!(at_steam.menu_id, "discover-a");
        assert_eq!(
            saved_state(&store).await.unwrap().history,
            vec![None, Some(water.id)]
        );

        let back = menu(controller.handle("chat", None, TurnEvent::GoBack).await);
        assert_eq!(back.current.as_ref(), Some(&water));
        assert_eq!(back.choices, at_water.choices);
        assert_eq!(generator.call_count(), 2);

        let state = saved_state(&store).await.unwrap();
        assert_eq!(state.current_node_id, Some(water.id));
        assert_eq!(state.history, vec![None]);
    }

    #[tokio::test]
    async fn test_back_at_root_stays_put() {
        let (controller, _store, _generator) = controller();
        let back = menu(controller.handle("chat", None, TurnEvent::GoBack).await);
        assert_eq!(back.depth, 0);
        assert!(back.current.is_none());
    }

    #[tokio::test]
    async fn test_generation_failure_keeps_session() {
        let (controller, store, generator) = controller();
        let root = menu(controller.handle("chat", None, TurnEvent::Start).await);
        let fire = child(&root, "Fire").clone();

        generator.queue_error(GenerationError::Schema("wrong count".to_string()));
        let response = controller
            .handle("chat", None, TurnEvent::SelectChild(fire.id))
            .await;

        assert!(matches!(response, TurnResponse::TryAgain { .. }));
        assert_eq!(saved_state(&store).await, Some(SessionState::default()));
        assert_eq!(store.db().children_of(Some(fire.id)).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_session() {
        let (controller, store, generator) = controller();
        let root = menu(controller.handle("chat", None, TurnEvent::Start).await);
        let air = child(&root, "Air").clone();

        generator.queue_names(&["Wind"]);
        store.fail_writes(true);
        let response = controller
            .handle("chat", None, TurnEvent::SelectChild(air.id))
            .await;
        assert!(matches!(response, TurnResponse::TryAgain { .. }));

        store.fail_writes(false);
        assert_eq!(saved_state(&store).await, Some(SessionState::default()));
    }

    #[tokio::test]
    async fn test_stale_selection_rerenders_current_menu() {
        let (controller, store, generator) = controller();
        let root = menu(controller.handle("chat", None, TurnEvent::Start).await);
        let earth = child(&root, "Earth").clone();
        let fire = child(&root, "Fire").clone();

        generator.queue_names(&["Mud"]);
        controller
            .handle("chat", None, TurnEvent::SelectChild(earth.id))
            .await;
        let writes = store.kv_write_count();

        // Fire is a root choice, not a child of Earth
        let again = menu(
            controller
                .handle("chat", None, TurnEvent::SelectChild(fire.id))
                .await,
        );
        assert_eq!(again.current.as_ref(), Some(&earth));

        let missing = menu(
            controller
                .handle("chat", None, TurnEvent::SelectChild(9999))
                .await,
        );
        assert_eq!(missing.current.as_ref(), Some(&earth));

        // Only the dialogue record was touched
        assert_eq!(store.kv_write_count(), writes + 2);
        assert_eq!(
            saved_state(&store).await.unwrap().current_node_id,
            Some(earth.id)
        );
    }

    #[tokio::test]
    async fn test_start_resets_deep_session() {
        let (controller, store, generator) = controller();
        let root = menu(controller.handle("chat", None, TurnEvent::Start).await);
        generator.queue_names(&["Lava"]);
        controller
            .handle("chat", None, TurnEvent::SelectChild(root.choices[0].id))
            .await;

        let restarted = menu(controller.handle("chat", None, TurnEvent::Start).await);
        assert_eq!(restarted.choices, root.choices);
        assert_eq!(saved_state(&store).await, Some(SessionState::default()));
    }

    #[tokio::test]
    async fn test_close_only_drops_dialogue() {
        let (controller, store, generator) = controller();
        let root = menu(controller.handle("chat", None, TurnEvent::Start).await);
        generator.queue_names(&["Lava"]);
        controller
            .handle("chat", None, TurnEvent::SelectChild(root.choices[0].id))
            .await;

        let dialogue_key = Namespace::Conversation.key("chat");
        let dialogue: MenuDialogue = load_json(&*store, &dialogue_key)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(dialogue.turns, 2);
        assert_eq!(dialogue.menu_id, "discover-b");

        let nodes_before = store.db().count_nodes().unwrap();
        let state_before = saved_state(&store).await;
        assert_eq!(
            controller.handle("chat", None, TurnEvent::Close).await,
            TurnResponse::Closed
        );

        assert!(store.db().kv_read(&dialogue_key).unwrap().is_none());
        assert_eq!(saved_state(&store).await, state_before);
        assert_eq!(store.db().count_nodes().unwrap(), nodes_before);
    }

    #[tokio::test]
    async fn test_corrupt_session_starts_at_root() {
        let (controller, store, _generator) = controller();
        store
            .db()
            .kv_write(&Namespace::Session.key("chat"), "{not json")
            .unwrap();

        let back = menu(controller.handle("chat", None, TurnEvent::GoBack).await);
        assert_eq!(back.depth, 0);
        assert_eq!(back.choices.len(), 4);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let (controller, _store, generator) = controller();
        let root = menu(controller.handle("a", None, TurnEvent::Start).await);
        generator.queue_names(&["Lava"]);
        controller
            .handle("a", None, TurnEvent::SelectChild(root.choices[0].id))
            .await;

        let other = menu(controller.handle("b", None, TurnEvent::GoBack).await);
        assert_eq!(other.depth, 0);
    }

    #[test]
    fn test_error_retryability() {
        use crate::llm::{LlmError, LlmErrorKind};

        let auth = SessionError::Tree(TreeError::Generation(GenerationError::Oracle(
            LlmError::new(LlmErrorKind::Auth, "bad key"),
        )));
        assert!(!auth.is_retryable());

        let schema = SessionError::Tree(TreeError::Generation(GenerationError::Schema(
            "wrong count".to_string(),
        )));
        assert!(schema.is_retryable());

        let storage = SessionError::Storage(StorageError::Unavailable("down".to_string()));
        assert!(storage.is_retryable());
    }

    #[test]
    fn test_response_serialization() {
        let closed = serde_json::to_value(TurnResponse::Closed).unwrap();
        assert_eq!(closed, serde_json::json!({"type": "closed"}));

        let retry = serde_json::to_value(TurnResponse::try_again()).unwrap();
        assert_eq!(retry["type"], "try_again");

        let menu = serde_json::to_value(TurnResponse::Menu(Menu {
            menu_id: MenuIdentity::Even.menu_id(),
            depth: 0,
            prompt: ROOT_PROMPT.to_string(),
            current: None,
            choices: Vec::new(),
            can_go_back: false,
        }))
        .unwrap();
        assert_eq!(menu["type"], "menu");
        assert_eq!(menu["menu_id"], "discover-a");
        assert!(menu["current"].is_null());
    }
}
