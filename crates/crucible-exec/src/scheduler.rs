//! Bounded thread-pool scheduler over a [`crucible_build::BuildPlan`]'s
//! DAG (spec §4.G, §5).
//!
//! The ready queue and in-degree bookkeeping are owned by a single
//! `Mutex`+`Condvar` pair, exactly the "shared ready-queue protected by a
//! mutex and a condition variable" the concurrency model calls for rather
//! than an async runtime: compiling and linking are blocking,
//! process-spawning workloads.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use petgraph::graph::NodeIndex;
use petgraph::Direction;

use crucible_build::{BuildNode, BuildPlan};

use crate::db::BuildDatabase;
use crate::depfile;
use crate::error::{Error, Result};
use crate::executor;
use crate::fingerprint;
use crate::node::{RunReport, TestOutcome};

pub struct ExecOptions {
    pub out_dir: PathBuf,
    pub jobs: usize,
    pub tweaks_dir: Option<PathBuf>,
}

impl ExecOptions {
    pub fn worker_count(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        }
    }
}

struct SharedState {
    in_degree: HashMap<NodeIndex, usize>,
    resolved: HashSet<NodeIndex>,
    queue: VecDeque<NodeIndex>,
    report: RunReport,
    total: usize,
}

pub struct Scheduler<'a> {
    plan: &'a BuildPlan,
    db: Arc<BuildDatabase>,
    opts: ExecOptions,
    cancel: Arc<AtomicBool>,
}

impl<'a> Scheduler<'a> {
    pub fn new(plan: &'a BuildPlan, db: Arc<BuildDatabase>, opts: ExecOptions, cancel: Arc<AtomicBool>) -> Self {
        Self { plan, db, opts, cancel }
    }

    pub fn run(&self) -> Result<RunReport> {
        let digest = fingerprint::tweaks_dir_digest(self.opts.tweaks_dir.as_deref())?;
        self.db.apply_cache_buster(digest)?;

        let mut in_degree = HashMap::new();
        let mut queue = VecDeque::new();
        for idx in self.plan.graph.node_indices() {
            let degree = self.plan.graph.edges_directed(idx, Direction::Incoming).count();
            in_degree.insert(idx, degree);
            if degree == 0 {
                queue.push_back(idx);
            }
        }
        let total = self.plan.graph.node_count();

        let state = Arc::new(Mutex::new(SharedState {
            in_degree,
            resolved: HashSet::new(),
            queue,
            report: RunReport::default(),
            total,
        }));
        let condvar = Arc::new(Condvar::new());

        std::thread::scope(|scope| {
            for _ in 0..self.opts.worker_count().max(1) {
                let state = Arc::clone(&state);
                let condvar = Arc::clone(&condvar);
                scope.spawn(|| self.worker_loop(state, condvar));
            }
        });

        let state = Arc::try_unwrap(state).ok().expect("all workers joined").into_inner().unwrap();
        state.report.into_result()
    }

    fn worker_loop(&self, state: Arc<Mutex<SharedState>>, condvar: Arc<Condvar>) {
        loop {
            let idx = {
                let mut guard = state.lock().unwrap();
                loop {
                    if let Some(idx) = guard.queue.pop_front() {
                        break Some(idx);
                    }
                    if guard.resolved.len() >= guard.total {
                        break None;
                    }
                    guard = condvar.wait(guard).unwrap();
                }
            };
            let Some(idx) = idx else { return };

            if self.cancel.load(Ordering::SeqCst) {
                self.resolve_cancelled(&state, &condvar, idx);
                continue;
            }

            let outcome = self.execute(idx);
            self.resolve(&state, &condvar, idx, outcome);
        }
    }

    fn resolve_cancelled(&self, state: &Arc<Mutex<SharedState>>, condvar: &Condvar, idx: NodeIndex) {
        let mut guard = state.lock().unwrap();
        guard.report.cancelled = true;
        skip_descendants(self.plan, &mut guard, idx);
        condvar.notify_all();
    }

    fn resolve(&self, state: &Arc<Mutex<SharedState>>, condvar: &Condvar, idx: NodeIndex, outcome: NodeOutcome) {
        let mut guard = state.lock().unwrap();
        match outcome {
            NodeOutcome::Success(tally) => {
                match tally {
                    Tally::Compiled => guard.report.compiled += 1,
                    Tally::SkippedUpToDate => guard.report.skipped += 1,
                    Tally::Archived => guard.report.archived += 1,
                    Tally::Linked => guard.report.linked += 1,
                }
                mark_resolved(&mut guard, idx);
                advance_successors(self.plan, &mut guard, idx);
            }
            NodeOutcome::CompileFailed(err) => {
                guard.report.compile_failures.push(err);
                skip_descendants(self.plan, &mut guard, idx);
            }
            NodeOutcome::LinkFailed(err) => {
                guard.report.link_failures.push(err);
                skip_descendants(self.plan, &mut guard, idx);
            }
            NodeOutcome::Tested(result) => {
                guard.report.test_outcomes.push(result);
                mark_resolved(&mut guard, idx);
                advance_successors(self.plan, &mut guard, idx);
            }
        }
        condvar.notify_all();
    }

    fn execute(&self, idx: NodeIndex) -> NodeOutcome {
        match &self.plan.graph[idx] {
            BuildNode::Compile(node) => self.run_compile(idx, node),
            BuildNode::Archive(node) => self.run_archive(node),
            BuildNode::Link(node) => self.run_link(node),
            BuildNode::Test(node) => self.run_test(idx, node),
        }
    }

    fn run_compile(&self, _idx: NodeIndex, node: &crucible_build::CompileNode) -> NodeOutcome {
        let output = node.output.to_string_lossy().into_owned();
        let command_hash = fingerprint::hash_command(&node.command);

        // The dep list that matters for "is this still up to date" is the
        // one recorded the *last* time this output compiled successfully,
        // not the deps of a command that hasn't run yet.
        let prior = self.db.lookup(&output).ok().flatten();
        let prior_deps: Vec<PathBuf> = prior.as_ref().map(|fp| fp.deps_list.iter().map(PathBuf::from).collect()).unwrap_or_default();
        let inputs_hash = match fingerprint::hash_inputs(&node.source, &prior_deps) {
            Ok(h) => h,
            Err(err) => return NodeOutcome::CompileFailed(Error::Io(err)),
        };

        if let Some(fp) = &prior {
            if fp.command_hash == command_hash && fp.inputs_hash == inputs_hash && node.output.exists() {
                return NodeOutcome::Success(Tally::SkippedUpToDate);
            }
        }

        if let Some(parent) = node.output.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                return NodeOutcome::CompileFailed(Error::Io(err));
            }
        }

        let finished = match executor::run(&node.command, &self.opts.out_dir, None) {
            Ok(f) => f,
            Err(err) => return NodeOutcome::CompileFailed(Error::ProcessSpawn { path: node.source.clone(), source: err }),
        };

        if finished.exit_code != Some(0) {
            return NodeOutcome::CompileFailed(Error::CompileFailure {
                output: node.output.clone(),
                command: node.command.clone(),
                status: finished.exit_code,
                stdout: finished.stdout,
                stderr: finished.stderr,
            });
        }

        // Re-hash against the dep list this compile itself just emitted, so
        // the row recorded now reflects the headers actually pulled in.
        let fresh_deps = depfile::parse(node.deps_mode, node.dep_file.as_deref(), &finished.stdout);
        let fresh_inputs_hash = match fingerprint::hash_inputs(&node.source, &fresh_deps) {
            Ok(h) => h,
            Err(err) => return NodeOutcome::CompileFailed(Error::Io(err)),
        };
        let deps_list: Vec<String> = fresh_deps.iter().map(|p| p.to_string_lossy().into_owned()).collect();
        if let Err(err) = self.db.record(&output, &command_hash, &fresh_inputs_hash, &deps_list) {
            return NodeOutcome::CompileFailed(err);
        }
        NodeOutcome::Success(Tally::Compiled)
    }

    fn run_archive(&self, node: &crucible_build::ArchiveNode) -> NodeOutcome {
        self.run_link_like(&node.output, &node.command_template, Tally::Archived)
    }

    fn run_link(&self, node: &crucible_build::LinkNode) -> NodeOutcome {
        self.run_link_like(&node.output, &node.command_template, Tally::Linked)
    }

    /// Archive and link nodes share the same shape: spawn, wait, and on
    /// failure surface a `LinkFailure` (spec §4.G groups both under
    /// "compile/archive/link failure").
    fn run_link_like(&self, output: &Path, command: &[String], tally: Tally) -> NodeOutcome {
        if let Some(parent) = output.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                return NodeOutcome::LinkFailed(Error::Io(err));
            }
        }
        let finished = match executor::run(command, &self.opts.out_dir, None) {
            Ok(f) => f,
            Err(err) => return NodeOutcome::LinkFailed(Error::ProcessSpawn { path: output.to_path_buf(), source: err }),
        };
        if finished.exit_code != Some(0) {
            return NodeOutcome::LinkFailed(Error::LinkFailure {
                output: output.to_path_buf(),
                command: command.to_vec(),
                status: finished.exit_code,
                stdout: finished.stdout,
                stderr: finished.stderr,
            });
        }
        NodeOutcome::Success(tally)
    }

    fn run_test(&self, idx: NodeIndex, node: &crucible_build::TestNode) -> NodeOutcome {
        // The link node this test wraps is its sole predecessor.
        let Some(link_idx) = self.plan.graph.neighbors_directed(idx, Direction::Incoming).next() else {
            return NodeOutcome::Tested(TestOutcome {
                name: node.name.clone(),
                executable: PathBuf::new(),
                exit_code: None,
                signal: None,
                timed_out: false,
                stdout: String::new(),
                stderr: "test node has no link predecessor".to_string(),
            });
        };
        let executable = match &self.plan.graph[link_idx] {
            BuildNode::Link(link) => link.output.clone(),
            _ => PathBuf::new(),
        };

        let timeout = node.timeout.unwrap_or(Duration::from_secs(300));
        let finished = match executor::run(&[executable.to_string_lossy().into_owned()], &self.opts.out_dir, Some(timeout)) {
            Ok(f) => f,
            Err(err) => {
                return NodeOutcome::Tested(TestOutcome {
                    name: node.name.clone(),
                    executable,
                    exit_code: None,
                    signal: None,
                    timed_out: false,
                    stdout: String::new(),
                    stderr: err.to_string(),
                });
            }
        };
        NodeOutcome::Tested(TestOutcome {
            name: node.name.clone(),
            executable,
            exit_code: finished.exit_code,
            signal: finished.signal,
            timed_out: finished.timed_out,
            stdout: finished.stdout,
            stderr: finished.stderr,
        })
    }
}

enum NodeOutcome {
    Success(Tally),
    CompileFailed(Error),
    LinkFailed(Error),
    Tested(TestOutcome),
}

enum Tally {
    Compiled,
    SkippedUpToDate,
    Archived,
    Linked,
}

fn mark_resolved(state: &mut SharedState, idx: NodeIndex) {
    state.resolved.insert(idx);
}

fn advance_successors(plan: &BuildPlan, state: &mut SharedState, idx: NodeIndex) {
    let successors: Vec<NodeIndex> = plan.graph.neighbors_directed(idx, Direction::Outgoing).collect();
    for succ in successors {
        if state.resolved.contains(&succ) {
            continue;
        }
        let degree = state.in_degree.entry(succ).or_insert(0);
        if *degree > 0 {
            *degree -= 1;
        }
        if *degree == 0 {
            state.queue.push_back(succ);
        }
    }
}

/// A failed compile/archive/link node blocks every node downstream of it;
/// mark that whole unresolved subgraph resolved-without-running so the
/// scheduler still terminates (spec §4.G "aborts scheduling of its
/// dependents but other independent branches continue").
fn skip_descendants(plan: &BuildPlan, state: &mut SharedState, idx: NodeIndex) {
    mark_resolved(state, idx);
    let mut stack: Vec<NodeIndex> = plan.graph.neighbors_directed(idx, Direction::Outgoing).collect();
    while let Some(node) = stack.pop() {
        if !state.resolved.insert(node) {
            continue;
        }
        state.report.blocked += 1;
        stack.extend(plan.graph.neighbors_directed(node, Direction::Outgoing));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crucible_build::{ActivatedPackage, PlanOptions};
    use crucible_metadata::LibraryInfo;
    use std::collections::BTreeSet;

    fn empty_lib(name: &str, path: &str) -> LibraryInfo {
        LibraryInfo {
            name: name.parse().unwrap(),
            path: path.into(),
            dependencies: Vec::new(),
            test_dependencies: Vec::new(),
            intra_using: Vec::new(),
            intra_test_using: Vec::new(),
        }
    }

    /// Writes a portable stand-in for `cc`/`ar`: it touches whichever
    /// argument is prefixed `-o` and exits 0, so the scheduler's
    /// bookkeeping can be exercised without relying on a real toolchain
    /// being installed on the host running the tests.
    fn write_stub_tool(dir: &Path) -> PathBuf {
        let path = dir.join("stub_tool.sh");
        std::fs::write(
            &path,
            "#!/bin/sh\nfor arg in \"$@\"; do\n  case \"$arg\" in\n    -o*) out=\"${arg#-o}\"; mkdir -p \"$(dirname \"$out\")\"; : > \"$out\" ;;\n  esac\ndone\nexit 0\n",
        )
        .unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    #[test]
    fn simple_build_compiles_archives_and_is_idempotent() {
        let src_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src_dir.path().join("lib/src")).unwrap();
        std::fs::write(src_dir.path().join("lib/src/a.c"), "int a(void) { return 1; }").unwrap();

        let out_dir = tempfile::tempdir().unwrap();
        let stub = write_stub_tool(out_dir.path());
        let toolchain = crucible_toolchain::Toolchain::from_json(&serde_json::json!({
            "compiler_id": "gnu",
            "c_compiler": stub.to_string_lossy(),
            "advanced": {
                "create_archive": [stub.to_string_lossy(), "-o[out]"],
            },
        }))
        .unwrap();
        let mut needed = BTreeSet::new();
        needed.insert("mylib".parse().unwrap());
        let pkg = ActivatedPackage {
            name: "root".parse().unwrap(),
            id: None,
            libraries: vec![empty_lib("mylib", "lib")],
            source_root: src_dir.path().to_path_buf(),
            needed_libs: needed,
        };

        let opts = PlanOptions {
            build_tests: false,
            build_apps: false,
            warnings: true,
            out_dir: out_dir.path().to_path_buf(),
            tweaks_dir: None,
            test_timeout: None,
        };
        let plan = crucible_build::BuildPlan::build(&toolchain, &[pkg], &opts).unwrap();

        let db = Arc::new(BuildDatabase::open(&out_dir.path().join(".crucible.db")).unwrap());
        let cancel = Arc::new(AtomicBool::new(false));
        let exec_opts = ExecOptions { out_dir: out_dir.path().to_path_buf(), jobs: 2, tweaks_dir: None };
        let scheduler = Scheduler::new(&plan, Arc::clone(&db), exec_opts, Arc::clone(&cancel));
        let report = scheduler.run().unwrap();
        assert_eq!(report.compile_failures.len(), 0);
        assert_eq!(report.link_failures.len(), 0);

        // Second run against the same build database must hit the
        // incremental-rebuild fast path instead of re-invoking the stub.
        let cancel2 = Arc::new(AtomicBool::new(false));
        let exec_opts2 = ExecOptions { out_dir: out_dir.path().to_path_buf(), jobs: 2, tweaks_dir: None };
        let scheduler2 = Scheduler::new(&plan, Arc::clone(&db), exec_opts2, cancel2);
        let report2 = scheduler2.run().unwrap();
        assert_eq!(report2.compile_failures.len(), 0);
    }

    #[test]
    fn cancellation_is_surfaced_as_user_cancelled() {
        let src_dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src_dir.path().join("lib/src")).unwrap();
        std::fs::write(src_dir.path().join("lib/src/a.c"), "int a(void) { return 1; }").unwrap();

        let out_dir = tempfile::tempdir().unwrap();
        let stub = write_stub_tool(out_dir.path());
        let toolchain = crucible_toolchain::Toolchain::from_json(&serde_json::json!({
            "compiler_id": "gnu",
            "c_compiler": stub.to_string_lossy(),
        }))
        .unwrap();
        let mut needed = BTreeSet::new();
        needed.insert("mylib".parse().unwrap());
        let pkg = ActivatedPackage {
            name: "root".parse().unwrap(),
            id: None,
            libraries: vec![empty_lib("mylib", "lib")],
            source_root: src_dir.path().to_path_buf(),
            needed_libs: needed,
        };
        let opts = PlanOptions {
            build_tests: false,
            build_apps: false,
            warnings: true,
            out_dir: out_dir.path().to_path_buf(),
            tweaks_dir: None,
            test_timeout: None,
        };
        let plan = crucible_build::BuildPlan::build(&toolchain, &[pkg], &opts).unwrap();
        let db = Arc::new(BuildDatabase::open(&out_dir.path().join(".crucible.db")).unwrap());
        let cancel = Arc::new(AtomicBool::new(true));
        let exec_opts = ExecOptions { out_dir: out_dir.path().to_path_buf(), jobs: 1, tweaks_dir: None };
        let scheduler = Scheduler::new(&plan, db, exec_opts, cancel);
        let err = scheduler.run().unwrap_err();
        assert!(matches!(err, Error::UserCancelled));
    }
}
