use std::sync::Arc;

use evalforge_core::auth::{AuthMethod, Secret};
use evalforge_core::dataset::{self, DatasetSource};
use evalforge_core::model::{
    EndpointInput, ExternalAppInput, HttpMethod, ModelBackend, NewModel, SamplingParams,
    SyntheticTestDraft, TestKind,
};
use evalforge_core::monitor::Scheduler;
use evalforge_core::providers::embedder::{Embedder, OpenAiEmbedder};
use evalforge_core::service::Service;
use evalforge_core::storage::Store;

use super::args::*;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const FAILED: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    if matches!(cli.cmd, Command::Version) {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(exit_codes::OK);
    }
    let service = build_service(&cli)?;
    match cli.cmd {
        Command::Model { cmd } => cmd_model(&service, cmd).await,
        Command::Eval { cmd } => cmd_eval(&service, cmd).await,
        Command::App { cmd } => cmd_app(&service, cmd),
        Command::Endpoint { cmd } => cmd_endpoint(&service, cmd),
        Command::Synthetic { cmd } => cmd_synthetic(&service, cmd).await,
        Command::Executions { test_id, limit } => {
            print_json(&service.list_executions(test_id, limit)?)?;
            Ok(exit_codes::OK)
        }
        Command::Metrics { cmd } => cmd_metrics(&service, cmd),
        Command::Watch { sync_interval } => cmd_watch(service, sync_interval).await,
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::OK)
        }
    }
}

fn build_service(cli: &Cli) -> anyhow::Result<Service> {
    if let Some(parent) = cli.db.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let store = Store::open(&cli.db)?;
    store.init_schema()?;

    let embedder: Option<Arc<dyn Embedder>> = cli.embeddings_key.as_ref().map(|key| {
        Arc::new(OpenAiEmbedder::new(cli.embedding_model.clone(), key.clone()))
            as Arc<dyn Embedder>
    });
    let scorers = evalforge_metrics::default_scorers(embedder);
    Ok(Service::new(store, scorers))
}

async fn cmd_model(service: &Service, cmd: ModelCmd) -> anyhow::Result<i32> {
    match cmd {
        ModelCmd::Add {
            name,
            endpoint,
            target,
        } => {
            let model = service.create_model(&NewModel {
                name,
                backend: ModelBackend::LocalInference,
                endpoint,
                model_name: target,
            })?;
            print_json(&model)?;
        }
        ModelCmd::List => print_json(&service.list_models()?)?,
        ModelCmd::Delete { id } => {
            service.delete_model(id)?;
            eprintln!("deleted model {}", id);
        }
        ModelCmd::Test { id } => {
            let model = service.test_connectivity(id).await?;
            print_json(&model)?;
        }
    }
    Ok(exit_codes::OK)
}

async fn cmd_eval(service: &Service, cmd: EvalCmd) -> anyhow::Result<i32> {
    match cmd {
        EvalCmd::Create {
            name,
            model_id,
            sample,
            dataset,
            temperature,
            max_tokens,
            top_p,
        } => {
            let source = match (sample, dataset) {
                (true, _) => DatasetSource::Sample,
                (false, Some(path)) => {
                    let file = std::fs::File::open(&path)?;
                    DatasetSource::Pairs(dataset::parse_csv(file)?)
                }
                (false, None) => {
                    eprintln!("config error: pass --sample or --dataset <csv>");
                    return Ok(exit_codes::CONFIG_ERROR);
                }
            };
            let params = SamplingParams {
                temperature,
                max_tokens,
                top_p,
            };
            let eval = service.create_evaluation(&name, model_id, source, params)?;
            print_json(&eval)?;
        }
        EvalCmd::List => print_json(&service.list_evaluations()?)?,
        EvalCmd::Run { id } => {
            let eval = service.run_evaluation(id).await?;
            print_json(&eval)?;
        }
        EvalCmd::Results { id } => {
            let (eval, results) = service.evaluation_results(id)?;
            print_json(&serde_json::json!({
                "evaluation": eval,
                "results": results,
            }))?;
        }
        EvalCmd::Delete { id } => {
            service.delete_evaluation(id)?;
            eprintln!("deleted evaluation {}", id);
        }
    }
    Ok(exit_codes::OK)
}

fn app_input(args: AppArgs) -> anyhow::Result<ExternalAppInput> {
    Ok(ExternalAppInput {
        name: args.name,
        service_name: args.service,
        base_url: args.base_url,
        description: args.description,
        auth_method: parse_auth_method(&args.auth_method)?,
        secret: args.secret.map(Secret::new),
        health_endpoint: Some(args.health_endpoint),
        timeout_secs: Some(args.timeout),
        ssl_verify: !args.no_ssl_verify,
        active: !args.inactive,
    })
}

fn cmd_app(service: &Service, cmd: AppCmd) -> anyhow::Result<i32> {
    match cmd {
        AppCmd::Add(args) => {
            let app = service.create_external_app(&app_input(args)?)?;
            print_json(&app)?;
        }
        AppCmd::List => print_json(&service.list_external_apps()?)?,
        AppCmd::Update { id, args } => {
            let app = service.update_external_app(id, &app_input(args)?)?;
            print_json(&app)?;
        }
        AppCmd::Delete { id } => {
            service.delete_external_app(id)?;
            eprintln!("deleted external app {} (and its endpoints)", id);
        }
    }
    Ok(exit_codes::OK)
}

fn endpoint_input(args: EndpointArgs) -> anyhow::Result<EndpointInput> {
    Ok(EndpointInput {
        method: parse_method(&args.method)?,
        path: args.path,
        expected_status: args.expected_status,
        expected_substring: args.contains,
        headers: None,
        body: None,
        timeout_secs: args.timeout,
        active: !args.inactive,
    })
}

fn cmd_endpoint(service: &Service, cmd: EndpointCmd) -> anyhow::Result<i32> {
    match cmd {
        EndpointCmd::Add { app_id, args } => {
            let endpoint = service.create_endpoint(app_id, &endpoint_input(args)?)?;
            print_json(&endpoint)?;
        }
        EndpointCmd::List { app_id } => print_json(&service.list_endpoints(app_id)?)?,
        EndpointCmd::Update { id, args } => {
            let endpoint = service.update_endpoint(id, &endpoint_input(args)?)?;
            print_json(&endpoint)?;
        }
        EndpointCmd::Delete { id } => {
            service.delete_endpoint(id)?;
            eprintln!("deleted endpoint {}", id);
        }
    }
    Ok(exit_codes::OK)
}

async fn cmd_synthetic(service: &Service, cmd: SyntheticCmd) -> anyhow::Result<i32> {
    match cmd {
        SyntheticCmd::Add {
            name,
            service: service_name,
            kind,
            url,
            method,
            expected_status,
            contains,
            timeout,
            interval,
            auth_method,
            secret,
            no_ssl_verify,
        } => {
            let kind = parse_kind(&kind)?;
            let mut draft = SyntheticTestDraft::manual(name, service_name, kind, url);
            draft.method = parse_method(&method)?;
            draft.expected_status = match expected_status {
                Some(status) => Some(status),
                None if kind == TestKind::Uptime => None,
                None => draft.expected_status,
            };
            draft.expected_substring = contains;
            draft.timeout_secs = timeout;
            draft.interval_secs = interval;
            draft.auth_method = parse_auth_method(&auth_method)?;
            draft.secret = secret.map(Secret::new);
            draft.ssl_verify = !no_ssl_verify;
            let test = service.create_synthetic_test(&draft)?;
            print_json(&test)?;
        }
        SyntheticCmd::FromApp { app_id, name, kind } => {
            let test = service.create_synthetic_test_from_app(app_id, &name, parse_kind(&kind)?)?;
            print_json(&test)?;
        }
        SyntheticCmd::List => print_json(&service.list_synthetic_tests()?)?,
        SyntheticCmd::Delete { id } => {
            service.delete_synthetic_test(id)?;
            eprintln!("deleted synthetic test {} (and its executions)", id);
        }
        SyntheticCmd::Execute { id } => {
            let execution = service.execute_synthetic_test(id).await?;
            print_json(&execution)?;
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_metrics(service: &Service, cmd: MetricsCmd) -> anyhow::Result<i32> {
    match cmd {
        MetricsCmd::Dashboard => print_json(&service.dashboard_rollup()?)?,
        MetricsCmd::Synthetic => print_json(&service.synthetic_rollup()?)?,
    }
    Ok(exit_codes::OK)
}

/// Run the interval scheduler until interrupted, reconciling against the
/// store every `sync_interval` seconds so new and changed tests are picked
/// up without a restart.
async fn cmd_watch(service: Service, sync_interval: u64) -> anyhow::Result<i32> {
    let scheduler = Scheduler::new(service.store().clone(), service.executor());
    let scheduled = scheduler.sync()?;
    eprintln!("watching {} active synthetic tests (ctrl-c to stop)", scheduled);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(std::time::Duration::from_secs(sync_interval.max(1))) => {
                if let Err(e) = scheduler.sync() {
                    tracing::warn!(error = %e, "scheduler sync failed");
                }
            }
        }
    }
    scheduler.shutdown();
    Ok(exit_codes::OK)
}

fn parse_auth_method(s: &str) -> anyhow::Result<AuthMethod> {
    AuthMethod::parse(s)
        .ok_or_else(|| anyhow::anyhow!("unknown auth method {:?} (none|api_key|bearer_token)", s))
}

fn parse_kind(s: &str) -> anyhow::Result<TestKind> {
    TestKind::parse(s).map_err(|_| anyhow::anyhow!("unknown test kind {:?} (uptime|api|browser)", s))
}

fn parse_method(s: &str) -> anyhow::Result<HttpMethod> {
    HttpMethod::parse(&s.to_uppercase())
        .map_err(|_| anyhow::anyhow!("unknown HTTP method {:?}", s))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
