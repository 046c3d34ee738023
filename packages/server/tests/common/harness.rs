//! Test harnesses.
//!
//! [`MemoryHarness`] wires in-memory stores, the in-memory queue and mock
//! collaborators into a real dispatcher and worker. [`TestHarness`] starts a
//! shared pgvector Postgres container for the ignored database tests.

use anyhow::{Context, Result};
use insight_core::domains::articles::PostgresArticleStore;
use insight_core::domains::sources::PostgresDataSourceStore;
use insight_core::kernel::jobs::{
    Dispatcher, JobWorker, JobWorkerConfig, MemoryJobQueue, PostgresJobQueue,
};
use insight_core::kernel::test_dependencies::TEST_DIMENSIONS;
use insight_core::kernel::{TestDependencies, WorkerDeps};
use insight_core::server::{build_app, AppState};
use sqlx::PgPool;
use std::sync::Arc;
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

// =============================================================================
// In-memory harness
// =============================================================================

/// Everything a handler or worker test needs, without Docker.
pub struct MemoryHarness {
    pub deps: TestDependencies,
    pub queue: MemoryJobQueue,
    pub worker: JobWorker,
}

impl MemoryHarness {
    pub fn new() -> Self {
        Self::with_deps(TestDependencies::new())
    }

    pub fn with_deps(deps: TestDependencies) -> Self {
        init_tracing();
        let queue = MemoryJobQueue::new();
        let dispatcher = Dispatcher::new(Arc::new(deps.worker_deps()));
        let worker = JobWorker::new(
            Arc::new(queue.clone()),
            dispatcher,
            JobWorkerConfig::with_worker_id("test-worker"),
        );
        Self {
            deps,
            queue,
            worker,
        }
    }

    pub fn worker_deps(&self) -> WorkerDeps {
        self.deps.worker_deps()
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(Arc::new(self.worker_deps()))
    }

    /// Run the worker until nothing is ready.
    pub async fn drain(&self) -> usize {
        self.worker
            .drain(20)
            .await
            .expect("memory queue should be available")
    }

    /// HTTP router over the same queue and article store.
    pub fn router(&self) -> axum::Router {
        build_app(AppState::new(
            Arc::new(self.queue.clone()),
            self.deps.articles.clone(),
        ))
    }

    pub fn dimensions(&self) -> usize {
        TEST_DIMENSIONS
    }
}

fn init_tracing() {
    // Run tests with: RUST_LOG=debug cargo test -- --nocapture
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Postgres harness
// =============================================================================

/// Shared test infrastructure that persists across all tests.
/// The container is started once and reused, migrations run once.
struct SharedTestInfra {
    db_url: String,
    // Keep the container alive for the entire test run
    _postgres: ContainerAsync<Postgres>,
}

/// Global shared infrastructure - initialized once, reused by all tests.
static SHARED_INFRA: OnceCell<SharedTestInfra> = OnceCell::const_new();

impl SharedTestInfra {
    async fn init() -> Result<Self> {
        init_tracing();

        // Postgres with the pgvector extension available
        let postgres = Postgres::default()
            .with_name("pgvector/pgvector")
            .with_tag("pg16")
            .with_cmd(["-c", "max_connections=200"])
            .start()
            .await
            .context("Failed to start Postgres container")?;

        let pg_host = postgres.get_host().await?;
        let pg_port = postgres.get_host_port_ipv4(5432).await?;
        let db_url = format!(
            "postgresql://postgres:postgres@{}:{}/postgres",
            pg_host, pg_port
        );

        let pool = PgPool::connect(&db_url)
            .await
            .context("Failed to connect to Postgres for migrations")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            db_url,
            _postgres: postgres,
        })
    }

    async fn get() -> &'static Self {
        SHARED_INFRA
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("Failed to initialize shared test infrastructure")
            })
            .await
    }
}

/// Database-backed harness.
///
/// ```ignore
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// #[ignore = "requires Docker"]
/// async fn my_test(ctx: &mut TestHarness) { ... }
/// ```
pub struct TestHarness {
    pub db_pool: PgPool,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new().await.expect("Failed to create test harness")
    }
}

impl TestHarness {
    pub async fn new() -> Result<Self> {
        let infra = SharedTestInfra::get().await;
        let db_pool = PgPool::connect(&infra.db_url)
            .await
            .context("Failed to connect to test database")?;
        Ok(Self { db_pool })
    }

    pub fn queue(&self) -> PostgresJobQueue {
        PostgresJobQueue::new(self.db_pool.clone())
    }

    /// Article store at the production dimension.
    pub fn articles(&self) -> PostgresArticleStore {
        PostgresArticleStore::new(self.db_pool.clone(), 1536)
    }

    pub fn sources(&self) -> PostgresDataSourceStore {
        PostgresDataSourceStore::new(self.db_pool.clone())
    }
}
