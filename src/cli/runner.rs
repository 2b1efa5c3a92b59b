use crate::{
    cli::{Args, RunMode},
    error::Result,
    orchestrator::{Orchestrator, RenderOptions},
    renderer::MiniJinjaRenderer,
    watch::{AutoRenderer, NotifyWatcher},
};

/// Main CLI runner: renders the definitions once or keeps watching them
pub struct Runner {
    args: Args,
}

impl Runner {
    pub fn new(args: Args) -> Self {
        Self { args }
    }

    /// Executes the run selected by the arguments
    ///
    /// # Returns
    /// * `Result<bool>` - Whether every definition rendered without failures;
    ///   an error only when auto-render mode cannot start
    pub fn run(self) -> Result<bool> {
        let engine = MiniJinjaRenderer::new();
        let orchestrator = Orchestrator::new(&engine, RenderOptions::from(&self.args));

        match self.args.run_mode() {
            RunMode::Once => Ok(orchestrator.process_all(&self.args.definition_files)),
            RunMode::AutoRender => {
                let watcher = NotifyWatcher::new()?;
                AutoRenderer::new(orchestrator, watcher).run(&self.args.definition_files)
            }
        }
    }
}

pub fn run(args: Args) -> Result<bool> {
    Runner::new(args).run()
}
