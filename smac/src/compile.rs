use crate::{
    cli::{self, BuildArgs, CompileArgs},
    config::Config,
    report::Reporter,
};

use anyhow::{bail, Context};
use smac_lib::{
    pipeline::{discover_sources, Pipeline, PipelineError, SOURCE_EXTENSION},
    Compiler, Error,
};

use std::sync::Arc;

const FAILED: &str = "couldn't compile due to the previous errors";

pub async fn compile_one(args: &CompileArgs, reporter: Arc<Reporter>) -> anyhow::Result<()> {
    let request = cli::extract_request(args)?;
    let compiler = Compiler::new().with_shared_observer(reporter);

    match compiler.compile(&request).await {
        Ok(_) => Ok(()),
        // Already reported line by line.
        Err(Error::Compile(_)) => bail!(FAILED),
        Err(err) => Err(err.into()),
    }
}

pub async fn build(args: &BuildArgs, reporter: Arc<Reporter>) -> anyhow::Result<()> {
    let config = Config::discover(args.config.as_deref())?;
    let (settings, src) = cli::extract_build_settings(args, config)?;

    let files = discover_sources(&src, SOURCE_EXTENSION)
        .with_context(|| format!("Failed to search `{}` for sources", src.display()))?;
    if files.is_empty() {
        tracing::warn!(src = %src.display(), "no .{SOURCE_EXTENSION} files found");
        return Ok(());
    }
    tracing::info!(count = files.len(), jobs = settings.jobs.get(), "building plugins");

    let pipeline = Pipeline::new(settings)
        .with_compiler(Compiler::new().with_shared_observer(reporter.clone()));

    match pipeline.run(files).await {
        Ok(passed) => {
            let msg = format!("{} plugin(s) processed.", passed.len());
            reporter.status(&reporter.theme().info, &msg);
            Ok(())
        }
        Err(PipelineError::Compile {
            source: Error::Compile(_),
            ..
        }) => bail!(FAILED),
        Err(err) => Err(err.into()),
    }
}
