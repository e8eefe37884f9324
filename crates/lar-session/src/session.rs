//! Session lifecycle management on top of the authenticated client.
//!
//! The `SessionManager` owns an internal finite state machine that makes the
//! lifecycle explicit instead of deriving it from whatever the store happens
//! to contain. Session data (the token triple) lives in the `TokenStore`;
//! the machine tracks only the lifecycle, including its transient states.

use crate::session_fsm::{
    SessionChangedPayload, SessionMachine, SessionMachineInput, SessionMachineState, SessionState,
};
use crate::{SessionError, SessionResult};
use lar_client::{AuthClient, ClientError, ClientResult, HttpTransport, ReqwestTransport};
use lar_core::Config;
use lar_storage::{StoredSession, TokenStore, User};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Login request body.
#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    senha: &'a str,
}

/// Registration request body.
#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    nome: &'a str,
    email: &'a str,
    senha: &'a str,
}

/// Envelope returned by the login and register endpoints.
#[derive(Debug, Deserialize)]
struct AuthResponse {
    success: bool,
    #[serde(default)]
    data: Option<AuthData>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthData {
    user: User,
    token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: String,
}

/// Envelope returned by the profile endpoint.
#[derive(Debug, Deserialize)]
struct MeResponse {
    data: User,
}

/// Callback type for session state change notifications.
pub type SessionStateCallback = Box<dyn Fn(SessionChangedPayload) + Send + Sync>;

/// Point-in-time view of the session for consumers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    /// Current lifecycle state.
    pub state: SessionState,
    /// True while restore, login, register or logout is in flight.
    pub loading: bool,
}

/// Clears the in-flight flag when the operation scope ends, including on
/// early returns.
struct LoadingGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Manages the authenticated session lifecycle.
///
/// Wraps an [`AuthClient`] and a [`TokenStore`], driving restore, login,
/// register and logout through an explicit state machine. Forced teardowns
/// signalled by the client (failed token refresh) are folded into the same
/// machine via the client's session-ended hook.
pub struct SessionManager<T: HttpTransport = ReqwestTransport> {
    client: Arc<AuthClient<T>>,
    store: Arc<TokenStore>,
    /// Lifecycle machine; session data itself lives in the store.
    machine: Mutex<SessionMachine>,
    /// Profile of the signed-in user, mirrored from the store.
    current_user: Mutex<Option<User>>,
    loading: AtomicBool,
    state_callback: Mutex<Option<SessionStateCallback>>,
}

impl SessionManager<ReqwestTransport> {
    /// Create a manager from the SDK configuration.
    pub fn new(config: &Config, store: Arc<TokenStore>) -> Arc<Self> {
        let client = Arc::new(AuthClient::new(config, store.clone()));
        Self::with_client(client, store)
    }
}

impl<T: HttpTransport + 'static> SessionManager<T> {
    /// Create a manager over an explicit client.
    ///
    /// Wires the client's session-ended hook back into the lifecycle machine,
    /// so a failed token refresh anywhere in the application surfaces as a
    /// transition to `Unauthenticated`.
    pub fn with_client(client: Arc<AuthClient<T>>, store: Arc<TokenStore>) -> Arc<Self> {
        let manager = Arc::new(Self {
            client,
            store,
            machine: Mutex::new(SessionMachine::new()),
            current_user: Mutex::new(None),
            loading: AtomicBool::new(false),
            state_callback: Mutex::new(None),
        });

        let weak = Arc::downgrade(&manager);
        manager.client.set_session_end_hook(Box::new(move || {
            if let Some(manager) = weak.upgrade() {
                manager.handle_session_end();
            }
        }));

        manager
    }

    /// Set a callback to be notified whenever the public state changes.
    pub fn set_state_callback(&self, callback: SessionStateCallback) {
        let mut cb = self.state_callback.lock().unwrap();
        *cb = Some(callback);
    }

    /// The client this manager drives, for domain resource calls.
    pub fn client(&self) -> &Arc<AuthClient<T>> {
        &self.client
    }

    /// The store holding the persisted session.
    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// Current state plus the in-flight flag.
    pub fn snapshot(&self) -> SessionSnapshot {
        let machine = self.machine.lock().unwrap();
        let state = self.public_state(machine.state());
        drop(machine);

        SessionSnapshot {
            state,
            loading: self.loading.load(Ordering::SeqCst),
        }
    }

    /// Current public state.
    pub fn state(&self) -> SessionState {
        self.snapshot().state
    }

    /// True only when a user is signed in.
    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    /// The signed-in user, if any.
    pub fn current_user(&self) -> Option<User> {
        self.current_user.lock().unwrap().clone()
    }

    /// Validate a persisted session on startup.
    ///
    /// With an empty store this settles to `Unauthenticated` without touching
    /// the network. With a stored triple the profile endpoint is queried; the
    /// client transparently refreshes an expired access token along the way.
    /// Any failure clears the store and settles to `Unauthenticated`. Network
    /// and server errors are folded into the resulting state, not returned.
    pub async fn restore_session(&self) -> SessionResult<SessionState> {
        self.transition(&SessionMachineInput::RestoreStarted)?;
        let _loading = self.begin_loading();

        let stored = match self.store.session() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to read stored session");
                None
            }
        };

        let Some(stored) = stored else {
            info!("No stored session found");
            return self.transition(&SessionMachineInput::NoStoredSession);
        };

        info!(user_id = stored.user.id, "Stored session found, validating with server");

        match self.client.get_json::<MeResponse>("/auth/me").await {
            Ok(me) => {
                let user = me.data;
                self.persist_validated_user(&user)?;
                *self.current_user.lock().unwrap() = Some(user);
                self.transition(&SessionMachineInput::RestoreSucceeded)
            }
            Err(e) => {
                warn!(error = %e, "Stored session rejected, clearing");
                if let Err(clear_err) = self.store.clear_session() {
                    warn!(error = %clear_err, "Failed to clear rejected session");
                }
                *self.current_user.lock().unwrap() = None;
                self.transition(&SessionMachineInput::RestoreFailed)
            }
        }
    }

    /// Sign in with email and password.
    ///
    /// On success the full token triple is persisted and the state becomes
    /// `Authenticated`. A rejection leaves the store untouched and settles
    /// back to `Unauthenticated`.
    pub async fn login(&self, email: &str, senha: &str) -> SessionResult<User> {
        if email.trim().is_empty() || senha.is_empty() {
            return Err(SessionError::Validation(
                "Por favor, preencha todos os campos".to_string(),
            ));
        }

        self.transition(&SessionMachineInput::LoginStarted)?;
        let _loading = self.begin_loading();

        let response = self
            .client
            .post_json::<_, AuthResponse>("/auth/login", &LoginRequest { email, senha })
            .await;

        self.finish_auth_attempt(response, "login")
    }

    /// Create an account and sign in with it.
    ///
    /// The server signs the new account in directly, so success persists the
    /// triple exactly like a login.
    pub async fn register(&self, nome: &str, email: &str, senha: &str) -> SessionResult<User> {
        if nome.trim().is_empty() || email.trim().is_empty() || senha.is_empty() {
            return Err(SessionError::Validation(
                "Por favor, preencha todos os campos".to_string(),
            ));
        }
        if senha.chars().count() < 6 {
            return Err(SessionError::Validation(
                "A senha deve ter pelo menos 6 caracteres".to_string(),
            ));
        }

        self.transition(&SessionMachineInput::LoginStarted)?;
        let _loading = self.begin_loading();

        let response = self
            .client
            .post_json::<_, AuthResponse>("/auth/register", &RegisterRequest { nome, email, senha })
            .await;

        self.finish_auth_attempt(response, "register")
    }

    /// Sign out.
    ///
    /// Server-side revocation is best effort; the local session is always
    /// cleared and the state always settles to `Unauthenticated`.
    pub async fn logout(&self) -> SessionResult<()> {
        let _ = self.transition(&SessionMachineInput::LogoutStarted);
        let _loading = self.begin_loading();

        if let Err(e) = self.client.post_empty("/auth/logout").await {
            warn!(error = %e, "Logout request failed, clearing local session anyway");
        }

        if let Err(e) = self.store.clear_session() {
            warn!(error = %e, "Failed to clear stored session on logout");
        }

        // The mirrored user must still be set when the machine leaves
        // LoggingOut, so the transition sees Authenticated -> Unauthenticated
        // and notifies the callback.
        let _ = self.transition(&SessionMachineInput::LogoutFinished);
        *self.current_user.lock().unwrap() = None;

        info!("Logged out");
        Ok(())
    }

    /// Complete a login or register attempt from the server's response.
    fn finish_auth_attempt(
        &self,
        response: ClientResult<AuthResponse>,
        operation: &str,
    ) -> SessionResult<User> {
        match response {
            Ok(body) if body.success => {
                let Some(data) = body.data else {
                    self.fail_auth_attempt();
                    return Err(SessionError::UnexpectedResponse(
                        "success response carried no session data".to_string(),
                    ));
                };

                if let Err(e) = self.store.set_session(&StoredSession {
                    access_token: data.token,
                    refresh_token: data.refresh_token,
                    user: data.user.clone(),
                }) {
                    self.fail_auth_attempt();
                    return Err(e.into());
                }

                info!(user_id = data.user.id, operation, "Authentication succeeded");
                *self.current_user.lock().unwrap() = Some(data.user.clone());
                self.transition(&SessionMachineInput::LoginSucceeded)?;
                Ok(data.user)
            }
            Ok(body) => {
                self.fail_auth_attempt();
                let message = body
                    .message
                    .unwrap_or_else(|| "credenciais rejeitadas".to_string());
                Err(SessionError::InvalidCredentials(message))
            }
            Err(ClientError::Api { status, message }) if (400..500).contains(&status) => {
                self.fail_auth_attempt();
                Err(SessionError::InvalidCredentials(message))
            }
            Err(e) => {
                self.fail_auth_attempt();
                Err(SessionError::Client(e))
            }
        }
    }

    /// Settle a failed login or register attempt.
    ///
    /// Also drops the mirrored user: a re-login attempt from `Authenticated`
    /// passed through `LoginStarted`, which already notified the downgrade.
    fn fail_auth_attempt(&self) {
        *self.current_user.lock().unwrap() = None;
        let _ = self.transition(&SessionMachineInput::LoginFailed);
    }

    /// Forced teardown signalled by the client after a failed token refresh.
    ///
    /// The client has already cleared the store; only the lifecycle and the
    /// mirrored user need updating. The transition runs before the user is
    /// cleared so the callback observes `Authenticated -> Unauthenticated`.
    /// Outside `Authenticated` the signal is deferred: the operation in
    /// flight owns the failure path and settles the state itself.
    fn handle_session_end(&self) {
        info!("Session ended by server, tearing down");
        match self.transition(&SessionMachineInput::SessionEnded) {
            Ok(_) => *self.current_user.lock().unwrap() = None,
            Err(_) => debug!("Session end signal deferred to the operation in flight"),
        }
    }

    /// Re-persist the server-validated profile alongside the current tokens.
    ///
    /// Tokens are re-read after the call, since a transparent refresh may
    /// have rotated the access token.
    fn persist_validated_user(&self, user: &User) -> SessionResult<()> {
        let access = self.store.access_token()?;
        let refresh = self.store.refresh_token()?;
        if let (Some(access_token), Some(refresh_token)) = (access, refresh) {
            self.store.set_session(&StoredSession {
                access_token,
                refresh_token,
                user: user.clone(),
            })?;
        }
        Ok(())
    }

    /// Transition the machine and notify the callback if the public state
    /// changed.
    fn transition(&self, input: &SessionMachineInput) -> SessionResult<SessionState> {
        let mut machine = self.machine.lock().unwrap();
        let old_state = self.public_state(machine.state());

        machine.consume(input).map_err(|_| {
            SessionError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                machine.state()
            ))
        })?;

        let new_state = self.public_state(machine.state());
        drop(machine);

        if old_state != new_state {
            debug!(
                old_state = ?old_state,
                new_state = ?new_state,
                "Session state transition"
            );
            self.notify_state_change(&new_state);
        }

        Ok(new_state)
    }

    /// Collapse a machine state into the public view.
    fn public_state(&self, machine_state: &SessionMachineState) -> SessionState {
        match machine_state {
            SessionMachineState::Uninitialized => SessionState::Uninitialized,
            SessionMachineState::Restoring => SessionState::Loading,
            SessionMachineState::LoggingIn | SessionMachineState::Unauthenticated => {
                SessionState::Unauthenticated
            }
            SessionMachineState::Authenticated | SessionMachineState::LoggingOut => {
                match self.current_user.lock().unwrap().clone() {
                    Some(user) => SessionState::Authenticated(user),
                    None => SessionState::Unauthenticated,
                }
            }
        }
    }

    fn notify_state_change(&self, state: &SessionState) {
        let cb = self.state_callback.lock().unwrap();
        if let Some(callback) = cb.as_ref() {
            callback(SessionChangedPayload {
                state: state.clone(),
            });
        }
    }

    fn begin_loading(&self) -> LoadingGuard<'_> {
        self.loading.store(true, Ordering::SeqCst);
        LoadingGuard {
            flag: &self.loading,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lar_client::{PreparedRequest, RawResponse};
    use lar_storage::{StorageResult, TokenStorage};
    use std::collections::{HashMap, VecDeque};

    /// In-memory storage for testing.
    struct MemoryStorage {
        data: Mutex<HashMap<String, String>>,
    }

    impl MemoryStorage {
        fn new() -> Self {
            Self {
                data: Mutex::new(HashMap::new()),
            }
        }
    }

    impl TokenStorage for MemoryStorage {
        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            self.data
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            Ok(self.data.lock().unwrap().get(key).cloned())
        }

        fn delete(&self, key: &str) -> StorageResult<bool> {
            Ok(self.data.lock().unwrap().remove(key).is_some())
        }
    }

    /// Scripted transport shared through an `Arc` so the manager can own it.
    struct MockTransport {
        responses: Mutex<VecDeque<ClientResult<RawResponse>>>,
        requests: Mutex<Vec<PreparedRequest>>,
    }

    impl MockTransport {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn queue(&self, status: u16, body: &str) {
            self.responses.lock().unwrap().push_back(Ok(RawResponse {
                status,
                body: body.to_string(),
            }));
        }

        fn queue_transport_error(&self, message: &str) {
            self.responses
                .lock()
                .unwrap()
                .push_back(Err(ClientError::Transport(message.to_string())));
        }

        fn sent(&self) -> Vec<PreparedRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    /// Local handle so the mock can implement the transport trait while the
    /// test keeps its own reference for scripting and assertions.
    #[derive(Clone)]
    struct SharedTransport(Arc<MockTransport>);

    impl HttpTransport for SharedTransport {
        async fn execute(&self, request: PreparedRequest) -> ClientResult<RawResponse> {
            self.0.requests.lock().unwrap().push(request);
            self.0
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("MockTransport response queue exhausted"))
        }
    }

    const USER_JSON: &str =
        r#"{"id": 1, "nome": "Ana", "email": "ana@example.com", "criado_em": "2025-01-15T10:00:00Z"}"#;

    fn test_user() -> User {
        serde_json::from_str(USER_JSON).unwrap()
    }

    fn auth_success_body(token: &str, refresh_token: &str) -> String {
        format!(
            r#"{{"success": true, "data": {{"user": {USER_JSON}, "token": "{token}", "refreshToken": "{refresh_token}"}}}}"#
        )
    }

    fn manager(transport: &Arc<MockTransport>) -> Arc<SessionManager<SharedTransport>> {
        let store = Arc::new(TokenStore::new(Box::new(MemoryStorage::new())));
        let client = Arc::new(AuthClient::with_transport(
            SharedTransport(transport.clone()),
            "http://localhost:3001/api",
            store.clone(),
        ));
        SessionManager::with_client(client, store)
    }

    fn manager_with_session(
        transport: &Arc<MockTransport>,
    ) -> Arc<SessionManager<SharedTransport>> {
        let manager = manager(transport);
        manager
            .store()
            .set_session(&StoredSession {
                access_token: "T1".to_string(),
                refresh_token: "R1".to_string(),
                user: test_user(),
            })
            .unwrap();
        manager
    }

    #[test]
    fn test_initial_state() {
        let transport = MockTransport::new();
        let manager = manager(&transport);

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.state, SessionState::Uninitialized);
        assert!(!snapshot.loading);
        assert!(!manager.is_authenticated());
        assert!(manager.current_user().is_none());
    }

    #[tokio::test]
    async fn test_restore_with_empty_store_is_offline() {
        let transport = MockTransport::new();
        let manager = manager(&transport);

        let state = manager.restore_session().await.unwrap();

        assert_eq!(state, SessionState::Unauthenticated);
        assert!(transport.sent().is_empty());
        assert!(!manager.snapshot().loading);
    }

    #[tokio::test]
    async fn test_restore_validates_and_repersists_profile() {
        let transport = MockTransport::new();
        // Server returns a fresher profile than the stored one
        transport.queue(
            200,
            r#"{"data": {"id": 1, "nome": "Ana Souza", "email": "ana@example.com", "criado_em": "2025-01-15T10:00:00Z"}}"#,
        );
        let manager = manager_with_session(&transport);

        let state = manager.restore_session().await.unwrap();

        assert!(state.is_authenticated());
        assert_eq!(state.user().map(|u| u.name.as_str()), Some("Ana Souza"));
        assert_eq!(
            manager.store().user().unwrap().map(|u| u.name),
            Some("Ana Souza".to_string())
        );

        // Validation used the stored bearer
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].url.ends_with("/auth/me"));
        assert_eq!(sent[0].bearer.as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn test_restore_survives_expired_access_token() {
        let transport = MockTransport::new();
        transport.queue(401, r#"{"error": "Token expirado"}"#);
        transport.queue(200, r#"{"token": "T2"}"#);
        transport.queue(200, &format!(r#"{{"data": {USER_JSON}}}"#));
        let manager = manager_with_session(&transport);

        let state = manager.restore_session().await.unwrap();

        assert!(state.is_authenticated());
        // The rotated access token was kept across the profile re-persist
        assert_eq!(
            manager.store().access_token().unwrap(),
            Some("T2".to_string())
        );
        assert_eq!(
            manager.store().refresh_token().unwrap(),
            Some("R1".to_string())
        );
    }

    #[tokio::test]
    async fn test_restore_rejected_clears_store() {
        let transport = MockTransport::new();
        transport.queue(401, r#"{"error": "Token expirado"}"#);
        transport.queue(401, r#"{"error": "Refresh token inválido"}"#);
        let manager = manager_with_session(&transport);

        let state = manager.restore_session().await.unwrap();

        assert_eq!(state, SessionState::Unauthenticated);
        assert!(!manager.store().has_session().unwrap());
        assert!(manager.current_user().is_none());
    }

    #[tokio::test]
    async fn test_restore_network_failure_clears_store() {
        let transport = MockTransport::new();
        transport.queue_transport_error("connection refused");
        let manager = manager_with_session(&transport);

        let state = manager.restore_session().await.unwrap();

        assert_eq!(state, SessionState::Unauthenticated);
        assert!(!manager.store().has_session().unwrap());
    }

    #[tokio::test]
    async fn test_login_persists_full_triple() {
        let transport = MockTransport::new();
        transport.queue(200, &auth_success_body("T1", "R1"));
        let manager = manager(&transport);

        let user = manager.login("ana@example.com", "segredo").await.unwrap();

        assert_eq!(user, test_user());
        assert!(manager.is_authenticated());

        let stored = manager.store().session().unwrap().unwrap();
        assert_eq!(stored.access_token, "T1");
        assert_eq!(stored.refresh_token, "R1");
        assert_eq!(stored.user, test_user());

        // Credentials went out unauthenticated, with the wire field names
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].url.ends_with("/auth/login"));
        assert!(sent[0].bearer.is_none());
        let body = sent[0].body.as_ref().unwrap();
        assert_eq!(body["email"], "ana@example.com");
        assert_eq!(body["senha"], "segredo");
    }

    #[tokio::test]
    async fn test_login_rejected_by_server() {
        let transport = MockTransport::new();
        transport.queue(401, r#"{"error": "Credenciais inválidas"}"#);
        let manager = manager(&transport);

        let result = manager.login("ana@example.com", "errada").await;

        assert!(matches!(
            result,
            Err(SessionError::InvalidCredentials(ref m)) if m == "Credenciais inválidas"
        ));
        assert_eq!(manager.state(), SessionState::Unauthenticated);
        assert!(!manager.store().has_session().unwrap());
        // No refresh was attempted for the unauthenticated rejection
        assert_eq!(transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_login_rejected_in_envelope() {
        let transport = MockTransport::new();
        transport.queue(200, r#"{"success": false, "message": "Conta bloqueada"}"#);
        let manager = manager(&transport);

        let result = manager.login("ana@example.com", "segredo").await;

        assert!(matches!(
            result,
            Err(SessionError::InvalidCredentials(ref m)) if m == "Conta bloqueada"
        ));
        assert_eq!(manager.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_login_validation_rejects_empty_fields() {
        let transport = MockTransport::new();
        let manager = manager(&transport);

        let result = manager.login("", "segredo").await;
        assert!(matches!(result, Err(SessionError::Validation(_))));

        let result = manager.login("ana@example.com", "").await;
        assert!(matches!(result, Err(SessionError::Validation(_))));

        // Rejected before any transition or request
        assert!(transport.sent().is_empty());
        assert_eq!(manager.state(), SessionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_register_validation_rejects_short_password() {
        let transport = MockTransport::new();
        let manager = manager(&transport);

        let result = manager.register("Ana", "ana@example.com", "12345").await;

        assert!(matches!(result, Err(SessionError::Validation(_))));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_register_signs_in_directly() {
        let transport = MockTransport::new();
        transport.queue(201, &auth_success_body("T1", "R1"));
        let manager = manager(&transport);

        let user = manager
            .register("Ana", "ana@example.com", "segredo")
            .await
            .unwrap();

        assert_eq!(user.name, "Ana");
        assert!(manager.is_authenticated());
        assert!(manager.store().has_session().unwrap());

        let sent = transport.sent();
        assert!(sent[0].url.ends_with("/auth/register"));
        assert_eq!(sent[0].body.as_ref().unwrap()["nome"], "Ana");
    }

    #[tokio::test]
    async fn test_logout_clears_even_when_server_fails() {
        let transport = MockTransport::new();
        transport.queue(200, &format!(r#"{{"data": {USER_JSON}}}"#));
        let manager = manager_with_session(&transport);
        manager.restore_session().await.unwrap();
        assert!(manager.is_authenticated());

        transport.queue(500, r#"{"error": "Erro interno"}"#);
        manager.logout().await.unwrap();

        assert_eq!(manager.state(), SessionState::Unauthenticated);
        assert!(!manager.store().has_session().unwrap());
        assert!(manager.current_user().is_none());
    }

    #[tokio::test]
    async fn test_logout_from_unauthenticated_is_harmless() {
        let transport = MockTransport::new();
        transport.queue(204, "");
        let manager = manager(&transport);

        manager.logout().await.unwrap();

        assert_eq!(manager.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_forced_teardown_reaches_the_manager() {
        let transport = MockTransport::new();
        transport.queue(200, &format!(r#"{{"data": {USER_JSON}}}"#));
        let manager = manager_with_session(&transport);
        manager.restore_session().await.unwrap();
        assert!(manager.is_authenticated());

        // A later domain call hits a revoked session: 401, failed refresh
        transport.queue(401, r#"{"error": "Token expirado"}"#);
        transport.queue(401, r#"{"error": "Refresh token inválido"}"#);

        let result = manager
            .client()
            .get_json::<serde_json::Value>("/imoveis")
            .await;

        assert!(matches!(result, Err(ClientError::SessionExpired)));
        assert_eq!(manager.state(), SessionState::Unauthenticated);
        assert!(manager.current_user().is_none());
        assert!(!manager.store().has_session().unwrap());
    }

    #[tokio::test]
    async fn test_state_callback_observes_lifecycle() {
        let transport = MockTransport::new();
        transport.queue(200, &auth_success_body("T1", "R1"));
        let manager = manager(&transport);

        let observed: Arc<Mutex<Vec<SessionState>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = observed.clone();
        manager.set_state_callback(Box::new(move |payload| {
            sink.lock().unwrap().push(payload.state);
        }));

        manager.login("ana@example.com", "segredo").await.unwrap();

        let states = observed.lock().unwrap();
        // Uninitialized -> Unauthenticated (logging in) -> Authenticated
        assert_eq!(states.len(), 2);
        assert_eq!(states[0], SessionState::Unauthenticated);
        assert!(states[1].is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_notifies_state_callback() {
        let transport = MockTransport::new();
        transport.queue(200, &format!(r#"{{"data": {USER_JSON}}}"#));
        let manager = manager_with_session(&transport);
        manager.restore_session().await.unwrap();
        assert!(manager.is_authenticated());

        let observed: Arc<Mutex<Vec<SessionState>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = observed.clone();
        manager.set_state_callback(Box::new(move |payload| {
            sink.lock().unwrap().push(payload.state);
        }));

        transport.queue(204, "");
        manager.logout().await.unwrap();

        let states = observed.lock().unwrap();
        assert_eq!(states.last(), Some(&SessionState::Unauthenticated));
    }

    #[tokio::test]
    async fn test_forced_teardown_notifies_state_callback() {
        let transport = MockTransport::new();
        transport.queue(200, &format!(r#"{{"data": {USER_JSON}}}"#));
        let manager = manager_with_session(&transport);
        manager.restore_session().await.unwrap();
        assert!(manager.is_authenticated());

        let observed: Arc<Mutex<Vec<SessionState>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = observed.clone();
        manager.set_state_callback(Box::new(move |payload| {
            sink.lock().unwrap().push(payload.state);
        }));

        transport.queue(401, r#"{"error": "Token expirado"}"#);
        transport.queue(401, r#"{"error": "Refresh token inválido"}"#);
        let result = manager
            .client()
            .get_json::<serde_json::Value>("/imoveis")
            .await;
        assert!(matches!(result, Err(ClientError::SessionExpired)));

        let states = observed.lock().unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0], SessionState::Unauthenticated);
        assert!(manager.current_user().is_none());
    }

    #[tokio::test]
    async fn test_loading_flag_clears_after_failure() {
        let transport = MockTransport::new();
        transport.queue_transport_error("connection refused");
        let manager = manager(&transport);

        let result = manager.login("ana@example.com", "segredo").await;

        assert!(matches!(result, Err(SessionError::Client(_))));
        assert!(!manager.snapshot().loading);
        assert_eq!(manager.state(), SessionState::Unauthenticated);
    }
}
