//!
//! velovis storefront client
//! -------------------------
//! Wires the pieces together: config → storage → session → gateway → cart and
//! api services. One `StorefrontClient` per process (or per test); nothing is
//! global. Dropping the client cancels every scope it handed out and stops the
//! cart's session listener.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{AdminApi, AuthApi, CatalogApi, OrdersApi, PaymentApi};
use crate::cart::CartSynchronizer;
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::gateway::{HttpTransport, Navigator, NoopNavigator, ReqwestTransport, RequestGateway};
use crate::identity::{AdminCapabilities, SessionManager};
use crate::storage::{FileStorage, MemoryStorage, SharedStorage};

pub struct StorefrontClientBuilder {
    config: ClientConfig,
    storage: Option<SharedStorage>,
    transport: Option<Arc<dyn HttpTransport>>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl StorefrontClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self { config, storage: None, transport: None, navigator: None }
    }

    /// Defaults to `FileStorage` under `storage_dir`, or memory when no directory is configured.
    pub fn storage(mut self, storage: SharedStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Defaults to `ReqwestTransport` against `api_base_url`.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Restore the persisted session, start the cart listener, and load the server
    /// cart when the restored session is authenticated.
    pub async fn build(self) -> ClientResult<StorefrontClient> {
        let config = self.config;
        config.validate()?;

        let storage: SharedStorage = match (self.storage, &config.storage_dir) {
            (Some(s), _) => s,
            (None, Some(dir)) => Arc::new(FileStorage::new(dir)?),
            (None, None) => Arc::new(MemoryStorage::new()),
        };
        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(t) => t,
            None => Arc::new(ReqwestTransport::new(&config)?),
        };
        let navigator = self.navigator.unwrap_or_else(|| Arc::new(NoopNavigator));

        let session = Arc::new(SessionManager::restore(storage.clone()));
        let gateway = Arc::new(RequestGateway::new(transport, session.clone(), navigator, config.login_route.clone()));
        let cart = Arc::new(CartSynchronizer::new(gateway.clone(), storage, config.guest_cart_policy));
        let listener = cart.attach(session.subscribe());

        if session.is_authenticated() {
            if let Err(e) = cart.fetch_cart().await {
                warn!(target: "velovis::cart", "initial cart load failed: {}", e);
            }
        }
        info!(
            target: "velovis::session",
            "client ready api={} authenticated={} guest_cart={:?}",
            config.api_root(), session.is_authenticated(), config.guest_cart_policy
        );

        Ok(StorefrontClient {
            auth: AuthApi::new(gateway.clone()),
            catalog: CatalogApi::new(gateway.clone()),
            orders: OrdersApi::new(gateway.clone()),
            payment: PaymentApi::new(gateway.clone()),
            admin: AdminApi::new(gateway.clone()),
            config,
            session,
            gateway,
            cart,
            root: CancellationToken::new(),
            listener,
        })
    }
}

pub struct StorefrontClient {
    config: ClientConfig,
    session: Arc<SessionManager>,
    gateway: Arc<RequestGateway>,
    cart: Arc<CartSynchronizer>,
    auth: AuthApi,
    catalog: CatalogApi,
    orders: OrdersApi,
    payment: PaymentApi,
    admin: AdminApi,
    root: CancellationToken,
    listener: JoinHandle<()>,
}

impl StorefrontClient {
    pub fn builder(config: ClientConfig) -> StorefrontClientBuilder {
        StorefrontClientBuilder::new(config)
    }

    pub async fn connect(config: ClientConfig) -> ClientResult<Self> {
        StorefrontClientBuilder::new(config).build().await
    }

    pub fn config(&self) -> &ClientConfig { &self.config }
    pub fn session(&self) -> &Arc<SessionManager> { &self.session }
    pub fn gateway(&self) -> &Arc<RequestGateway> { &self.gateway }
    pub fn cart(&self) -> &Arc<CartSynchronizer> { &self.cart }
    pub fn auth(&self) -> &AuthApi { &self.auth }
    pub fn catalog(&self) -> &CatalogApi { &self.catalog }
    pub fn orders(&self) -> &OrdersApi { &self.orders }
    pub fn payment(&self) -> &PaymentApi { &self.payment }
    pub fn admin(&self) -> &AdminApi { &self.admin }

    /// Capabilities of whoever is logged in right now.
    pub fn capabilities(&self) -> AdminCapabilities {
        AdminCapabilities::for_user(self.session.user().as_ref())
    }

    /// A token for one UI scope (a page, a dialog). Cancel it when the scope goes
    /// away; it is also cancelled when the client is dropped.
    pub fn scope(&self) -> CancellationToken {
        self.root.child_token()
    }
}

impl Drop for StorefrontClient {
    fn drop(&mut self) {
        self.root.cancel();
        self.listener.abort();
    }
}
