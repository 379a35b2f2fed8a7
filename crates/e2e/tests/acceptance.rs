//! Acceptance suite entry point
//!
//! Plays the role of the scenario runner: emits lifecycle events for the
//! nested frames, rich-text editor and windows features and drives the page
//! workflows from the step bodies.
//! Run with: PAGECHECK_WEBDRIVER_URL=http://127.0.0.1:4444 cargo test -p pagecheck-e2e --test acceptance

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pagecheck_common::config::WEBDRIVER_URL_VAR;
use pagecheck_common::{BrowserKind, EnvironmentTag, HarnessConfig};
use pagecheck_e2e::events::{
    Feature, FeatureChild, GherkinDocument, GherkinStep, Pickle, PickleStep, StepContainer,
};
use pagecheck_e2e::workflows::{timestamped, EditorPage, NestedFramesPage, Page, TextColor, WindowsPage};
use pagecheck_e2e::{
    CaptureOutcome, E2eError, E2eResult, ElementRef, LifecycleCoordinator, RunnerResult,
    RunnerStatus, ScenarioContext, StepContext, WebDriverFactory,
};

type Coordinator = LifecycleCoordinator<WebDriverFactory>;

#[derive(Parser, Debug)]
#[command(name = "pagecheck-acceptance")]
#[command(about = "Browser acceptance suite for the reference application")]
struct Args {
    /// Browser to launch (chrome, firefox, edge)
    #[arg(long)]
    browser: Option<String>,

    /// Target environment (dev, qa, prod)
    #[arg(long)]
    env: Option<String>,

    /// WebDriver endpoint
    #[arg(long)]
    webdriver_url: Option<String>,

    /// Report output directory
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Run the browser headless
    #[arg(long)]
    headless: bool,

    /// Harness configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run only scenarios whose feature name contains this text
    #[arg(long)]
    only: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::try_parse().unwrap_or_else(|e| {
        warn!("Ignoring unrecognized arguments: {}", e);
        Args::parse_from(["pagecheck-acceptance"])
    });

    let endpoint_configured = args.webdriver_url.is_some()
        || std::env::var(WEBDRIVER_URL_VAR).map(|v| !v.is_empty()).unwrap_or(false);
    if !endpoint_configured {
        println!("skipping acceptance suite: set {} to run it", WEBDRIVER_URL_VAR);
        return;
    }

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    };

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    match rt.block_on(async_main(config, args.only)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

fn build_config(args: &Args) -> anyhow::Result<HarnessConfig> {
    let base = match &args.config {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::default(),
    };
    let mut config = base.apply_env(|name| std::env::var(name).ok());

    if let Some(browser) = &args.browser {
        config.browser = BrowserKind::parse_lenient(browser);
    }
    if let Some(env) = &args.env {
        config.environment = EnvironmentTag::parse_lenient(env);
    }
    if let Some(url) = &args.webdriver_url {
        config.webdriver_url = url.clone();
    }
    if let Some(dir) = &args.results_dir {
        config.results_dir = dir.clone();
    }
    config.headless |= args.headless;
    Ok(config)
}

async fn async_main(config: HarnessConfig, only: Option<String>) -> anyhow::Result<bool> {
    let factory = WebDriverFactory::from_config(&config)?;
    let mut coordinator = LifecycleCoordinator::new(config, factory);
    coordinator.before_run().await;

    let selected = |feature: &str| only.as_deref().map_or(true, |o| feature.contains(o));
    let mut outcomes = Vec::new();

    if selected("Nested Frames") {
        outcomes.push(("Nested Frames", nested_frames(&mut coordinator).await));
    }
    if selected("TinyMCE") {
        outcomes.push(("TinyMCE", editor(&mut coordinator).await));
    }
    if selected("Windows") {
        outcomes.push(("Windows", windows(&mut coordinator).await));
    }

    if let Some(path) = coordinator.after_run() {
        info!("Environment written to {}", path.display());
    }

    let failed = outcomes.iter().filter(|(_, passed)| !passed).count();
    for (feature, passed) in &outcomes {
        info!("{}: {}", feature, if *passed { "passed" } else { "failed" });
    }
    info!("{} scenario(s), {} failed", outcomes.len(), failed);
    Ok(failed == 0)
}

fn ensure(condition: bool, message: impl Into<String>) -> E2eResult<()> {
    if condition {
        Ok(())
    } else {
        Err(E2eError::AssertionFailed(message.into()))
    }
}

async fn bounded<F>(limit: Duration, body: F) -> E2eResult<()>
where
    F: Future<Output = E2eResult<()>>,
{
    match tokio::time::timeout(limit, body).await {
        Ok(result) => result,
        Err(_) => Err(E2eError::Timeout {
            what: "step".to_string(),
            after: limit,
        }),
    }
}

/// Runs one step body unless an earlier step failed
macro_rules! step {
    ($run:ident, $($body:tt)*) => {
        if $run.step().await {
            let limit = $run.step_timeout();
            let result = bounded(limit, async {
                let outcome: E2eResult<()> = $($body)*;
                outcome
            })
            .await;
            $run.done(result).await;
        }
    };
}

/// Event bookkeeping for one scenario
struct ScenarioRun<'a> {
    coordinator: &'a mut Coordinator,
    context: ScenarioContext,
    steps: Vec<StepContext>,
    next: usize,
    failure: Option<String>,
}

impl<'a> ScenarioRun<'a> {
    async fn begin(
        coordinator: &'a mut Coordinator,
        feature: &str,
        uri: &str,
        name: &str,
        steps: &[(&str, &str)],
    ) -> ScenarioRun<'a> {
        let gherkin_steps: Vec<GherkinStep> = steps
            .iter()
            .enumerate()
            .map(|(i, (keyword, text))| GherkinStep {
                id: format!("{}-{}", uri, i),
                keyword: format!("{} ", keyword),
                text: text.to_string(),
            })
            .collect();

        let step_contexts = gherkin_steps
            .iter()
            .map(|s| StepContext {
                pickle_step: Some(PickleStep {
                    text: Some(s.text.clone()),
                    ast_node_ids: vec![s.id.clone()],
                }),
                text: None,
            })
            .collect();

        let context = ScenarioContext {
            pickle: Pickle {
                id: uri.to_string(),
                name: Some(name.to_string()),
                uri: Some(uri.to_string()),
            },
            gherkin_document: Some(GherkinDocument {
                feature: Some(Feature {
                    name: Some(feature.to_string()),
                    children: vec![FeatureChild {
                        scenario: Some(StepContainer { steps: gherkin_steps }),
                        background: None,
                    }],
                }),
            }),
            name: None,
        };

        let failure = match coordinator.before_scenario(&context).await {
            Ok(()) => None,
            Err(e) => {
                error!("Scenario '{}' could not start: {}", name, e);
                Some(e.to_string())
            }
        };

        ScenarioRun {
            coordinator,
            context,
            steps: step_contexts,
            next: 0,
            failure,
        }
    }

    fn step_timeout(&self) -> Duration {
        self.coordinator.config().step_timeout()
    }

    fn page(&self) -> Option<Page> {
        let base_url = self.coordinator.config().base_url();
        self.coordinator
            .sessions()
            .current()
            .map(|session| Page::for_session(session, base_url))
    }

    /// Open the next step. A step after a failure is reported as skipped.
    async fn step(&mut self) -> bool {
        let Some(step) = self.steps.get(self.next).cloned() else {
            return false;
        };
        if self.failure.is_some() {
            self.skip(&step).await;
            return false;
        }
        self.coordinator.before_step(&step);
        true
    }

    async fn skip(&mut self, step: &StepContext) {
        self.coordinator.before_step(step);
        self.coordinator
            .after_step(step, &RunnerResult::with_status(RunnerStatus::Skipped))
            .await;
        self.next += 1;
    }

    async fn done(&mut self, result: E2eResult<()>) {
        let Some(step) = self.steps.get(self.next).cloned() else {
            return;
        };
        self.next += 1;

        let runner_result = match result {
            Ok(()) => RunnerResult::passed(),
            Err(e) => {
                error!("Step failed: {}", e);
                self.failure = Some(e.to_string());
                RunnerResult::failed(e.to_string()).with_stack(format!("{:?}", e))
            }
        };
        self.coordinator.after_step(&step, &runner_result).await;
    }

    async fn capture(&mut self, name: &str, targets: &[ElementRef]) -> CaptureOutcome {
        self.coordinator.capture(name, targets).await
    }

    fn attach(&mut self, name: &str, content: &str) -> CaptureOutcome {
        self.coordinator.attach(name, content)
    }

    /// Close the scenario; returns whether it passed
    async fn end(mut self) -> bool {
        while let Some(step) = self.steps.get(self.next).cloned() {
            self.skip(&step).await;
        }
        let result = match &self.failure {
            None => RunnerResult::passed(),
            Some(message) => RunnerResult::failed(message.clone()),
        };
        if let Some(path) = self.coordinator.after_scenario(&self.context, &result).await {
            info!("Result written to {}", path.display());
        }
        self.failure.is_none()
    }
}

async fn nested_frames(coordinator: &mut Coordinator) -> bool {
    let mut run = ScenarioRun::begin(
        coordinator,
        "Nested Frames",
        "features/nested_frames.feature",
        "Obtener el texto de todos los frames",
        &[
            ("Given", "el usuario navega a la pagina de Nested Frames"),
            ("When", "se obtiene el texto de todos los frames"),
            ("And", "son impresos los textos obtenidos"),
            ("Then", "se deberian haber obtenido textos de los frames correctamente"),
        ],
    )
    .await;
    let Some(page) = run.page() else {
        return run.end().await;
    };
    let mut frames = NestedFramesPage::new(page);

    step!(run, {
        frames.navigate().await?;
        run.capture("Pagina Principal", &[]).await;
        Ok(())
    });

    step!(run, {
        frames.collect_texts().await?;
        let targets = frames.top_level_frames().await?;
        run.capture("Se obtienen los textos de los frames", &targets).await;
        Ok(())
    });

    step!(run, {
        let joined = frames.texts().join(", ");
        info!("Textos obtenidos: {}", joined);
        run.attach("Textos obtenidos de los frames", &joined);
        Ok(())
    });

    step!(run, {
        ensure(!frames.texts().is_empty(), "Los textos obtenidos no deben estar vacios")?;
        let joined = frames.texts().join(", ");
        let targets = frames.top_level_frames().await?;
        run.capture(&format!("Validacion textos obtenidos: {}", joined), &targets)
            .await;
        run.attach("Validando los textos obtenidos", &joined);
        Ok(())
    });

    run.end().await
}

async fn editor(coordinator: &mut Coordinator) -> bool {
    let mut run = ScenarioRun::begin(
        coordinator,
        "TinyMCE",
        "features/tinymce.feature",
        "Escribir texto con formato en el editor",
        &[
            ("Given", "el usuario navega a la pagina de TinyMCE"),
            ("When", "borra el texto existente en el editor"),
            ("And", "escribe el texto \"Hola Mundo\" en negritas"),
            ("And", "es centrado el texto"),
            ("And", "procede a cambia el color del texto a \"azul\""),
            ("And", "se guarda y obtiene el texto del editor"),
            ("Then", "el texto escrito se encuentra almacenado en la variable"),
        ],
    )
    .await;
    let Some(page) = run.page() else {
        return run.end().await;
    };
    let editor = EditorPage::new(page);
    let mut saved = String::new();

    step!(run, {
        editor.navigate().await?;
        run.capture("Pagina Principal", &[]).await;
        Ok(())
    });

    step!(run, {
        editor.clear().await?;
        let frame = editor.editor_frame().await?;
        run.capture("Es borrado el texto del editor", &[frame]).await;
        Ok(())
    });

    step!(run, {
        saved = timestamped("Hola Mundo", chrono::Local::now().naive_local());
        editor.insert_bold(&saved).await?;
        let frame = editor.editor_frame().await?;
        run.capture("Texto escrito en negritas", &[frame]).await;
        Ok(())
    });

    step!(run, {
        editor.center().await?;
        ensure(editor.is_centered().await?, "El texto no esta centrado")?;
        let frame = editor.editor_frame().await?;
        run.capture("El texto escrito es centrado", &[frame]).await;
        Ok(())
    });

    step!(run, {
        let color = TextColor::parse_lenient("azul");
        editor.recolor(color).await?;
        let frame = editor.editor_frame().await?;
        run.capture(&format!("Color del texto cambiado a {}", color), &[frame])
            .await;
        Ok(())
    });

    step!(run, {
        saved = editor.text().await?;
        Ok(())
    });

    step!(run, {
        ensure(!saved.is_empty(), "El texto guardado no debe estar vacio")?;
        let frame = editor.editor_frame().await?;
        run.capture(
            &format!("Validacion del texto guardado en la variable: {}", saved),
            &[frame],
        )
        .await;
        run.attach("Texto almacenado en la variable", &saved);
        Ok(())
    });

    run.end().await
}

async fn windows(coordinator: &mut Coordinator) -> bool {
    let mut run = ScenarioRun::begin(
        coordinator,
        "Windows",
        "features/windows.feature",
        "Abrir una nueva ventana y leer su contenido",
        &[
            ("Given", "el usuario navega a la pagina principal"),
            ("When", "hace clic en el enlace para abrir una nueva ventana"),
            ("And", "se cierra la pestaña anterior"),
            ("And", "se captura el texto de la nueva ventana"),
            ("Then", "el mensaje mostrado debe ser \"New Window\""),
        ],
    )
    .await;
    let Some(page) = run.page() else {
        return run.end().await;
    };
    let mut windows = WindowsPage::new(page);

    step!(run, {
        windows.navigate().await?;
        run.capture("Pagina Principal", &[]).await;
        Ok(())
    });

    step!(run, {
        let link = windows.open_new_window().await?;
        run.capture(
            "Se hace clic en el texto \"Click Here\" para abrir una nueva ventana",
            &[link],
        )
        .await;
        Ok(())
    });

    step!(run, {
        windows.switch_to_new_closing_original().await?;
        run.capture("Ventana anterior cerrada", &[]).await;
        Ok(())
    });

    step!(run, {
        let (heading, text) = windows.read_heading().await?;
        run.capture("Texto capturado de la nueva ventana", &[heading])
            .await;
        run.attach("Texto capturado", &text);
        Ok(())
    });

    step!(run, {
        let text = windows.heading().unwrap_or_default().to_string();
        ensure(
            text.contains("New Window"),
            format!("El texto obtenido '{}' debe contener 'New Window'", text),
        )?;
        let (heading, _) = windows.read_heading().await?;
        run.capture(&format!("Validando el texto obtenido: {}", text), &[heading])
            .await;
        Ok(())
    });

    run.end().await
}
