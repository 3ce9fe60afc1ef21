//! Boundary service consumed by the presentation layer. Thin orchestration
//! over the store, runner, executor and aggregator; no business rules of its
//! own beyond wiring collaborators together.

use std::sync::Arc;
use tokio::time::{timeout, Duration};

use crate::aggregate::{self, DashboardRollup, SyntheticRollup};
use crate::dataset::DatasetSource;
use crate::engine::{RunPolicy, Runner};
use crate::errors::CoreResult;
use crate::model::{
    Endpoint, EndpointInput, Evaluation, Execution, ExternalApp, ExternalAppInput, Model,
    ModelStatus, NewModel, ResultRow, SamplingParams, SyntheticTest, SyntheticTestDraft, TestKind,
};
use crate::monitor::ProbeExecutor;
use crate::providers::llm::local::{model_listed, LocalInferenceClient};
use crate::providers::llm::InferenceClient;
use crate::scoring::Scorer;
use crate::storage::Store;

const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default synthetic rollup window.
pub const ROLLUP_WINDOW_HOURS: i64 = 24;

pub struct Service {
    store: Store,
    executor: Arc<ProbeExecutor>,
    scorers: Vec<Arc<dyn Scorer>>,
    policy: RunPolicy,
}

impl Service {
    pub fn new(store: Store, scorers: Vec<Arc<dyn Scorer>>) -> Self {
        let executor = Arc::new(ProbeExecutor::new(store.clone()));
        Self {
            store,
            executor,
            scorers,
            policy: RunPolicy::default(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn executor(&self) -> Arc<ProbeExecutor> {
        self.executor.clone()
    }

    // -- models -------------------------------------------------------------

    pub fn create_model(&self, new: &NewModel) -> CoreResult<Model> {
        self.store.create_model(new)
    }

    pub fn list_models(&self) -> CoreResult<Vec<Model>> {
        self.store.list_models()
    }

    pub fn delete_model(&self, id: i64) -> CoreResult<()> {
        self.store.delete_model(id)
    }

    /// Probe the model's backend and leave the model in connected or error,
    /// never in testing or untested.
    pub async fn test_connectivity(&self, id: i64) -> CoreResult<Model> {
        let model = self.store.get_model(id)?;
        self.store.set_model_status(id, ModelStatus::Testing)?;
        let client = LocalInferenceClient::new(model.endpoint.clone(), model.model_name.clone());
        let status = match timeout(CONNECTIVITY_TIMEOUT, client.list_models()).await {
            Ok(Ok(names)) if model_listed(&model.model_name, &names) => ModelStatus::Connected,
            Ok(Ok(_)) => {
                tracing::info!(model = id, "target model not served by endpoint");
                ModelStatus::Error
            }
            Ok(Err(e)) => {
                tracing::info!(model = id, error = %e, "connectivity check failed");
                ModelStatus::Error
            }
            Err(_) => {
                tracing::info!(model = id, "connectivity check timed out");
                ModelStatus::Error
            }
        };
        self.store.set_model_status(id, status)?;
        self.store.get_model(id)
    }

    // -- evaluations --------------------------------------------------------

    pub fn create_evaluation(
        &self,
        name: &str,
        model_id: i64,
        source: DatasetSource,
        params: SamplingParams,
    ) -> CoreResult<Evaluation> {
        let model = self.store.get_model(model_id)?;
        let pairs = source.resolve()?;
        self.store.create_evaluation(name, &model, params, &pairs)
    }

    pub fn list_evaluations(&self) -> CoreResult<Vec<Evaluation>> {
        self.store.list_evaluations()
    }

    pub async fn run_evaluation(&self, id: i64) -> CoreResult<Evaluation> {
        let eval = self.store.get_evaluation(id)?;
        let model = self.store.get_model(eval.model_id)?;
        let client = Arc::new(LocalInferenceClient::new(
            model.endpoint.clone(),
            model.model_name.clone(),
        ));
        let runner = Runner {
            store: self.store.clone(),
            client,
            scorers: self.scorers.clone(),
            policy: self.policy.clone(),
        };
        runner.run(id).await
    }

    pub fn evaluation_results(&self, id: i64) -> CoreResult<(Evaluation, Vec<ResultRow>)> {
        let eval = self.store.get_evaluation(id)?;
        let results = self.store.list_results(id)?;
        Ok((eval, results))
    }

    pub fn delete_evaluation(&self, id: i64) -> CoreResult<()> {
        self.store.delete_evaluation(id)
    }

    // -- external apps ------------------------------------------------------

    pub fn create_external_app(&self, input: &ExternalAppInput) -> CoreResult<ExternalApp> {
        self.store.create_external_app(input)
    }

    pub fn list_external_apps(&self) -> CoreResult<Vec<ExternalApp>> {
        self.store.list_external_apps()
    }

    pub fn update_external_app(&self, id: i64, input: &ExternalAppInput) -> CoreResult<ExternalApp> {
        self.store.update_external_app(id, input)
    }

    pub fn delete_external_app(&self, id: i64) -> CoreResult<()> {
        self.store.delete_external_app(id)
    }

    pub fn create_endpoint(&self, app_id: i64, input: &EndpointInput) -> CoreResult<Endpoint> {
        self.store.create_endpoint(app_id, input)
    }

    pub fn list_endpoints(&self, app_id: i64) -> CoreResult<Vec<Endpoint>> {
        self.store.list_endpoints(app_id)
    }

    pub fn update_endpoint(&self, id: i64, input: &EndpointInput) -> CoreResult<Endpoint> {
        self.store.update_endpoint(id, input)
    }

    pub fn delete_endpoint(&self, id: i64) -> CoreResult<()> {
        self.store.delete_endpoint(id)
    }

    // -- synthetic tests ----------------------------------------------------

    pub fn create_synthetic_test(&self, draft: &SyntheticTestDraft) -> CoreResult<SyntheticTest> {
        self.store.create_synthetic_test(draft)
    }

    /// Create a health probe derived from an external app.
    pub fn create_synthetic_test_from_app(
        &self,
        app_id: i64,
        name: &str,
        kind: TestKind,
    ) -> CoreResult<SyntheticTest> {
        let app = self.store.get_external_app(app_id)?;
        let draft = SyntheticTestDraft::from_external_app(&app, name, kind);
        self.store.create_synthetic_test(&draft)
    }

    pub fn list_synthetic_tests(&self) -> CoreResult<Vec<SyntheticTest>> {
        self.store.list_synthetic_tests()
    }

    pub fn delete_synthetic_test(&self, id: i64) -> CoreResult<()> {
        self.store.delete_synthetic_test(id)
    }

    /// On-demand probe; appends exactly one Execution.
    pub async fn execute_synthetic_test(&self, id: i64) -> CoreResult<Execution> {
        let test = self.store.get_synthetic_test(id)?;
        self.executor.execute(&test).await
    }

    pub fn list_executions(
        &self,
        test_id: Option<i64>,
        limit: Option<usize>,
    ) -> CoreResult<Vec<Execution>> {
        self.store.list_executions(test_id, limit)
    }

    // -- metrics ------------------------------------------------------------

    pub fn dashboard_rollup(&self) -> CoreResult<DashboardRollup> {
        let evaluations = self.store.list_evaluations()?;
        Ok(aggregate::dashboard_rollup(&evaluations))
    }

    /// Per-category success rates and response times over the trailing
    /// 24-hour window.
    pub fn synthetic_rollup(&self) -> CoreResult<SyntheticRollup> {
        let cutoff = chrono::Utc::now() - chrono::Duration::hours(ROLLUP_WINDOW_HOURS);
        let mut rollup = SyntheticRollup::default();
        for kind in TestKind::ALL {
            let executions = self.store.list_executions_since(kind, cutoff)?;
            let category = aggregate::category_rollup(&executions);
            match kind {
                TestKind::Uptime => rollup.uptime = category,
                TestKind::Api => rollup.api = category,
                TestKind::Browser => rollup.browser = category,
            }
        }
        Ok(rollup)
    }
}
