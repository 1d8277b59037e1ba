use clap::Parser;
use octofhir_conformance::{
    BasicResourceOracle, ConformanceConfig, FhirClient, OutcomeKind, ReqwestServerClient,
    RunContext, SequenceEnv, SequenceRunner, StaticCapabilities, uscore,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "conformance-runner", version, about = "Run US Core conformance sequences against a FHIR server")]
struct Args {
    /// JSON configuration file (server_url, patient_id, bearer_token, engine, auth)
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Sequence to run, by name or resource type (e.g. CarePlan)
    #[arg(short, long, default_value = "CarePlan")]
    sequence: String,

    /// Run only these case keys, in sequence order
    #[arg(long = "case", value_name = "KEY")]
    cases: Vec<String>,

    /// Override the patient id from the configuration
    #[arg(long)]
    patient: Option<String>,

    /// Exit with a failure status when a required case does not pass
    #[arg(long)]
    strict: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = ConformanceConfig::from_json_file(&args.config)?;
    if let Some(patient) = args.patient {
        config = config.with_patient(patient);
    }

    let mut sequence = uscore::sequence(&args.sequence)
        .ok_or_else(|| format!("Unknown sequence: {}", args.sequence))?;
    if !args.cases.is_empty() {
        let keys: Vec<&str> = args.cases.iter().map(String::as_str).collect();
        sequence = sequence.only(&keys);
    }

    let transport = Arc::new(ReqwestServerClient::new(&config.engine)?);
    let client = FhirClient::new(&config.server_url, transport);
    let env = SequenceEnv::new(client, Arc::new(BasicResourceOracle::us_core()?))
        .with_engine_config(config.engine.clone());
    let runner = SequenceRunner::new(env, Arc::new(StaticCapabilities::allow_all()))
        .with_fhir_version(config.fhir_version);

    let mut ctx = RunContext::new(&config.patient_id);
    ctx.bearer_token = config.bearer_token.clone();

    let results = runner.run(&sequence, &mut ctx).await;
    println!("{}", serde_json::to_string_pretty(&results)?);

    let failed = results
        .iter()
        .filter(|r| !r.optional)
        .any(|r| matches!(r.kind(), OutcomeKind::Fail | OutcomeKind::Error));
    if args.strict && failed {
        std::process::exit(1);
    }

    Ok(())
}
