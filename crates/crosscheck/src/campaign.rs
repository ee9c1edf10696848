//! The fuzzing campaign: draw seeds, generate candidates, evaluate them
//! across backends, and persist whatever disagrees.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crosscheck_oracle::{
    Backend, BackendTable, CancelToken, Candidate, CompilerUnderTest, Criterion, Oracle,
    OracleConfig, Outcome, RetainPolicy, classify_cascade,
};
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, RngCore, SeedableRng};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::generator::{Generation, Generator};
use crate::known_bugs::KnownBugFilter;
use crate::metrics;
use crate::persist::persist_evidence;

/// Default campaign budget in hours.
pub const DEFAULT_BUDGET_HOURS: u64 = 12;

/// Criteria applied to runtime verdicts, checked in order; the first match
/// names the bug class a candidate is filed under.
pub const DEFAULT_CRITERIA: [Criterion; 5] = [
    Criterion::NonZeroExit,
    Criterion::Timeout,
    Criterion::ExitCodeDiffer,
    Criterion::StdoutDiffer,
    Criterion::StderrDiffer,
];

/// Campaign settings. Fields are plain data so the CLI can fill them in
/// directly on top of [`CampaignConfig::new`] defaults.
#[derive(Debug)]
pub struct CampaignConfig {
    pub generator: Generator,
    pub compiler: CompilerUnderTest,
    pub backends: Vec<Backend>,
    pub table: BackendTable,
    pub compile_timeout: Duration,
    pub run_timeout: Duration,
    /// Campaign root; claim, scratch, and evidence directories live under it.
    pub output_dir: PathBuf,
    /// Worker threads; 0 sizes from the host CPU count.
    pub jobs: usize,
    pub budget: Duration,
    /// Base RNG seed for reproducible campaigns.
    pub seed: Option<u64>,
    /// Stop after this many candidates even while budget remains.
    pub max_iterations: Option<u64>,
    pub known_bugs: KnownBugFilter,
    /// Leave every build workspace under `scratch/` instead of removing it
    /// after evaluation. Debugging aid; interesting builds are copied into
    /// the evidence directory either way.
    pub keep_workspaces: bool,
    /// External cancellation, e.g. from a signal handler. The budget deadline
    /// is layered on top of it.
    pub cancel: CancelToken,
}

impl CampaignConfig {
    pub fn new(
        generator: Generator,
        compiler: CompilerUnderTest,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            generator,
            compiler,
            backends: Backend::DEFAULT_TARGETS.to_vec(),
            table: BackendTable::default(),
            compile_timeout: crosscheck_oracle::DEFAULT_TIMEOUT,
            run_timeout: crosscheck_oracle::DEFAULT_TIMEOUT,
            output_dir: output_dir.into(),
            jobs: 0,
            budget: Duration::from_secs(DEFAULT_BUDGET_HOURS * 60 * 60),
            seed: None,
            max_iterations: None,
            known_bugs: KnownBugFilter::default(),
            keep_workspaces: false,
            cancel: CancelToken::new(),
        }
    }
}

/// Totals across every worker, aggregated once the pool drains.
#[derive(Debug, Default, Clone)]
pub struct CampaignSummary {
    /// Seeds drawn, including ones lost to claim races.
    pub iterations: u64,
    /// Seeds another runner claimed first.
    pub duplicates: u64,
    pub generator_failures: u64,
    pub known_bugs: u64,
    pub compile_bugs: u64,
    pub wrong_code: u64,
    /// Interesting candidates another runner persisted first.
    pub independently_found: u64,
    pub valid_programs: u64,
    pub elapsed: Duration,
}

mod colors {
    pub const RED: &str = "\x1b[0;31m";
    pub const GREEN: &str = "\x1b[0;32m";
    pub const YELLOW: &str = "\x1b[0;33m";
    pub const RESET: &str = "\x1b[0m";
}

/// Print the campaign totals.
pub fn print_summary(summary: &CampaignSummary) {
    println!();
    println!("================================");
    println!("Attempts: {}", summary.iterations);
    println!(
        "{}WRONG CODE{}: {}",
        colors::RED,
        colors::RESET,
        summary.wrong_code
    );
    println!(
        "{}COMPILE BUGS{}: {}",
        colors::RED,
        colors::RESET,
        summary.compile_bugs
    );
    println!(
        "{}KNOWN BUGS{}: {}",
        colors::YELLOW,
        colors::RESET,
        summary.known_bugs
    );
    println!(
        "{}VALID PROGRAMS{}: {}",
        colors::GREEN,
        colors::RESET,
        summary.valid_programs
    );
    println!("Generator failures: {}", summary.generator_failures);
    println!("Duplicate seeds: {}", summary.duplicates);
    println!("Independently found: {}", summary.independently_found);
    println!("Elapsed: {:.1?}", summary.elapsed);
    println!();
}

struct CampaignDirs {
    claims: PathBuf,
    scratch: PathBuf,
    compile_errors: PathBuf,
    wrong_code: PathBuf,
}

impl CampaignDirs {
    fn create(root: &Path) -> Result<Self> {
        let dirs = Self {
            claims: root.join("claims"),
            scratch: root.join("scratch"),
            compile_errors: root.join("compile-errors"),
            wrong_code: root.join("wrong-code"),
        };
        for dir in [
            &dirs.claims,
            &dirs.scratch,
            &dirs.compile_errors,
            &dirs.wrong_code,
        ] {
            fs::create_dir_all(dir)?;
        }
        Ok(dirs)
    }
}

fn effective_jobs(requested: usize) -> usize {
    if requested == 0 {
        num_cpus::get().saturating_sub(2).max(1)
    } else {
        requested
    }
}

/// Claim the next iteration slot; refuses once `cap` is reached.
fn claim_iteration(drawn: &AtomicU64, cap: Option<u64>) -> bool {
    let Some(cap) = cap else {
        drawn.fetch_add(1, Ordering::SeqCst);
        return true;
    };
    let mut current = drawn.load(Ordering::SeqCst);
    while current < cap {
        match drawn.compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => return true,
            Err(actual) => current = actual,
        }
    }
    false
}

/// Run a campaign to completion: budget spent, iteration cap reached, or
/// cancellation.
///
/// Workers draw 64-bit seeds independently, claim each seed through
/// `claims/<uid>` so concurrent runners sharing the output directory never
/// duplicate work, and file interesting candidates under
/// `compile-errors/<uid>` or `wrong-code/<uid>`. With a fixed
/// [`CampaignConfig::seed`] and worker count the drawn seed sequence is
/// reproducible.
///
/// # Errors
///
/// Fails when the output layout cannot be created, the oracle configuration
/// is rejected, the worker pool cannot be built, or any iteration hits a
/// non-cancellation error (a broken oracle stops the campaign rather than
/// miscounting candidates).
pub fn run_campaign(config: CampaignConfig) -> Result<CampaignSummary> {
    if config.backends.len() < 2 {
        return Err(Error::Config(
            "differential campaign needs at least two backends".to_string(),
        ));
    }

    let started = Instant::now();
    let dirs = CampaignDirs::create(&config.output_dir)?;
    let jobs = effective_jobs(config.jobs);
    let cancel = started.checked_add(config.budget).map_or_else(
        || config.cancel.clone(),
        |deadline| config.cancel.deadline_at(deadline),
    );

    let oracle_config = OracleConfig::new(config.compiler.clone(), DEFAULT_CRITERIA[0])
        .with_backends(config.backends.clone())
        .with_table(config.table.clone())
        .with_compile_timeout(config.compile_timeout)
        .with_run_timeout(config.run_timeout)
        .with_scratch_dir(&dirs.scratch)
        .with_retain(RetainPolicy::Always);
    let oracle = Oracle::new(oracle_config)?.with_cancel(cancel.clone());

    metrics::record_workers(jobs);
    info!(
        jobs,
        budget_secs = config.budget.as_secs(),
        output = %config.output_dir.display(),
        "campaign started"
    );

    let mut base = config
        .seed
        .map_or_else(SmallRng::from_entropy, SmallRng::seed_from_u64);
    let worker_seeds: Vec<u64> = (0..jobs).map(|_| base.next_u64()).collect();

    let summary = Mutex::new(CampaignSummary::default());
    let drawn = AtomicU64::new(0);
    let fatal: Mutex<Option<Error>> = Mutex::new(None);

    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
    let worker = Worker {
        config: &config,
        dirs: &dirs,
        oracle: &oracle,
        cancel: &cancel,
        summary: &summary,
        drawn: &drawn,
        fatal: &fatal,
    };
    pool.scope(|scope| {
        for worker_seed in worker_seeds {
            scope.spawn(move |_| worker.run(worker_seed));
        }
    });

    if let Some(err) = fatal.into_inner() {
        return Err(err);
    }

    let mut summary = summary.into_inner();
    summary.iterations = drawn.into_inner();
    summary.elapsed = started.elapsed();
    info!(
        attempts = summary.iterations,
        wrong_code = summary.wrong_code,
        compile_bugs = summary.compile_bugs,
        valid_programs = summary.valid_programs,
        "campaign finished"
    );
    Ok(summary)
}

#[derive(Clone, Copy)]
struct Worker<'a> {
    config: &'a CampaignConfig,
    dirs: &'a CampaignDirs,
    oracle: &'a Oracle,
    cancel: &'a CancelToken,
    summary: &'a Mutex<CampaignSummary>,
    drawn: &'a AtomicU64,
    fatal: &'a Mutex<Option<Error>>,
}

impl Worker<'_> {
    fn run(&self, rng_seed: u64) {
        let mut rng = SmallRng::seed_from_u64(rng_seed);
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            if !claim_iteration(self.drawn, self.config.max_iterations) {
                break;
            }
            match self.iterate(&mut rng) {
                Ok(()) => {}
                Err(Error::Oracle(crosscheck_oracle::Error::Cancelled)) => break,
                Err(err) => {
                    error!(error = %err, "iteration failed; stopping the campaign");
                    let mut slot = self.fatal.lock();
                    if slot.is_none() {
                        *slot = Some(err);
                    }
                    drop(slot);
                    self.cancel.cancel();
                    break;
                }
            }
        }
    }

    fn bump(&self, update: impl FnOnce(&mut CampaignSummary)) {
        update(&mut self.summary.lock());
    }

    fn iterate(&self, rng: &mut SmallRng) -> Result<()> {
        let seed = rng.gen_range(i64::MIN..=i64::MAX);
        let uid = format!("cand_{seed}");
        metrics::record_candidate();

        // First-wins claim; the loser moves on to the next seed.
        match fs::create_dir(self.dirs.claims.join(&uid)) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                debug!(seed, "seed already claimed");
                self.bump(|summary| summary.duplicates += 1);
                metrics::record_duplicate();
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }

        let gen_dir = self.dirs.scratch.join(format!("gen-{uid}"));
        let gen_started = Instant::now();
        let generation = self
            .config
            .generator
            .generate(seed, &gen_dir, self.cancel)?;
        metrics::record_generate_duration(gen_started.elapsed().as_secs_f64());

        let program = match generation {
            Generation::Program(path) => path,
            Generation::TimedOut => {
                self.bump(|summary| summary.generator_failures += 1);
                metrics::record_generator_failure("timeout");
                fs::remove_dir_all(&gen_dir)?;
                return Ok(());
            }
            Generation::Failed => {
                self.bump(|summary| summary.generator_failures += 1);
                metrics::record_generator_failure("rejected");
                fs::remove_dir_all(&gen_dir)?;
                return Ok(());
            }
        };

        let candidate = Candidate::from_source(program)?;
        let eval_started = Instant::now();
        let evaluation = self.oracle.evaluate(&candidate)?;
        metrics::record_evaluate_duration(eval_started.elapsed().as_secs_f64());

        let result = self.file_outcome(
            seed,
            &uid,
            &gen_dir,
            &evaluation.outcome,
            evaluation.workspace.as_deref(),
        );
        if !self.config.keep_workspaces {
            if let Some(workspace) = &evaluation.workspace {
                if let Err(err) = fs::remove_dir_all(workspace) {
                    warn!(error = %err, "failed to remove retained workspace");
                }
            }
        }
        result?;
        fs::remove_dir_all(&gen_dir)?;
        Ok(())
    }

    fn file_outcome(
        &self,
        seed: i64,
        uid: &str,
        gen_dir: &Path,
        outcome: &Outcome,
        workspace: Option<&Path>,
    ) -> Result<()> {
        if self.config.known_bugs.matches_outcome(outcome) {
            info!(seed, "matches a known bug; skipping");
            self.bump(|summary| summary.known_bugs += 1);
            metrics::record_known_bug();
            return Ok(());
        }

        match outcome {
            Outcome::CompileTimeout(_) | Outcome::CompileFailed(_) => {
                let status = if matches!(outcome, Outcome::CompileTimeout(_)) {
                    "compile-timeout"
                } else {
                    "compile-error"
                };
                let dest = self.dirs.compile_errors.join(uid);
                if persist_evidence(&dest, gen_dir, outcome, workspace)? {
                    warn!(seed, status, "compiler bug candidate persisted");
                    self.bump(|summary| summary.compile_bugs += 1);
                    metrics::record_compile_bug(status);
                } else {
                    self.bump(|summary| summary.independently_found += 1);
                    metrics::record_duplicate();
                }
            }
            Outcome::Verdict(verdict) => {
                let cascade = classify_cascade(&verdict.evidence, &DEFAULT_CRITERIA)?;
                if cascade.interesting {
                    let reason = cascade.reason;
                    let refined = Outcome::Verdict(cascade);
                    let dest = self.dirs.wrong_code.join(uid);
                    if persist_evidence(&dest, gen_dir, &refined, workspace)? {
                        warn!(seed, %reason, "wrong-code candidate persisted");
                        self.bump(|summary| summary.wrong_code += 1);
                        metrics::record_wrong_code(reason.as_str());
                    } else {
                        self.bump(|summary| summary.independently_found += 1);
                        metrics::record_duplicate();
                    }
                } else {
                    self.bump(|summary| summary.valid_programs += 1);
                    metrics::record_valid_program();
                }
            }
        }
        Ok(())
    }
}
