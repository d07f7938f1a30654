use std::sync::Arc;
use std::thread;

use accord_ast::{DeclTable, Expr, ExprKind, HostCode};
use accord_translate::target::{DependKind, TargetOperand, TokenArg};
use accord_translate::{
    DataRange, MapDescriptor, TargetClause, TargetDirective, TargetDirectiveKind, TargetStmt, TargetStmtKind, VariableIdentity,
};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::device::{DeviceRegistry, Section};
use crate::error::RuntimeError;
use crate::kernel::{Frame, Kernel, KernelContext};
use crate::memory::{HostMemory, View};
use crate::scheduler::{queue_key, Scheduler};

/// State every task of one execution shares.
pub(crate) struct Shared {
    pub decls: DeclTable,
    pub host: HostMemory,
    pub device: DeviceRegistry,
    pub scheduler: Scheduler,
    kernels: RwLock<FxHashMap<String, Kernel>>,
}

impl Shared {
    pub fn identity(&self, name: &str) -> Result<VariableIdentity, RuntimeError> {
        self.decls
            .lookup(name)
            .map(|id| VariableIdentity::Plain(self.decls.canonical(id)))
            .ok_or_else(|| RuntimeError::UnknownVariable(name.to_string()))
    }
}

/// Runs translated programs against host memory and a simulated device.
///
/// Directives marked `nowait` run on their own thread once the tasks their
/// `depend` clauses name have finished. Everything else runs on the
/// calling thread.
pub struct Executor {
    shared: Arc<Shared>,
}

impl Executor {
    pub fn new(decls: DeclTable) -> Self {
        let host = HostMemory::new(&decls);
        Self {
            shared: Arc::new(Shared {
                decls,
                host,
                device: DeviceRegistry::new(),
                scheduler: Scheduler::new(),
                kernels: RwLock::new(FxHashMap::default()),
            }),
        }
    }

    /// Sets the host contents of `name`, resizing its storage.
    pub fn define(&self, name: &str, values: &[i64]) -> Result<(), RuntimeError> {
        let identity = self.shared.identity(name)?;
        self.shared.host.define(identity, values);
        Ok(())
    }

    /// Binds the code labelled `label`.
    pub fn bind<F>(&self, label: impl Into<String>, kernel: F)
    where
        F: Fn(&KernelContext<'_>) -> Result<(), RuntimeError> + Send + Sync + 'static,
    {
        self.shared.kernels.write().insert(label.into(), Arc::new(kernel));
    }

    /// Host contents of `name`.
    pub fn read(&self, name: &str) -> Result<Vec<i64>, RuntimeError> {
        let identity = self.shared.identity(name)?;
        let view = self
            .shared
            .host
            .view(&identity)
            .ok_or_else(|| RuntimeError::UnknownVariable(name.to_string()))?;
        Ok((0..view.len()).filter_map(|i| view.load(i)).collect())
    }

    pub fn device(&self) -> &DeviceRegistry {
        &self.shared.device
    }

    /// Executes `stmt`, then waits for every task it left running.
    pub fn run(&self, stmt: &TargetStmt) -> Result<(), RuntimeError> {
        let result = exec_stmt(&self.shared, stmt, &Frame::host());
        let joined = self.shared.scheduler.join();
        result.and(joined)
    }
}

fn exec_stmt(shared: &Arc<Shared>, stmt: &TargetStmt, frame: &Frame) -> Result<(), RuntimeError> {
    match &stmt.kind {
        TargetStmtKind::Directive(directive) => exec_directive(shared, directive, frame),
        TargetStmtKind::Compound(stmts) => stmts.iter().try_for_each(|s| exec_stmt(shared, s, frame)),
        TargetStmtKind::If { cond, then, otherwise } => {
            if eval(shared, frame, cond)? != 0 {
                exec_stmt(shared, then, frame)
            } else if let Some(otherwise) = otherwise {
                exec_stmt(shared, otherwise, frame)
            } else {
                Ok(())
            }
        }
        TargetStmtKind::While { cond, body } => {
            while eval(shared, frame, cond)? != 0 {
                exec_stmt(shared, body, frame)?;
                thread::yield_now();
            }
            Ok(())
        }
        TargetStmtKind::DoWhile { body, cond } => loop {
            exec_stmt(shared, body, frame)?;
            if eval(shared, frame, cond)? == 0 {
                return Ok(());
            }
        },
        TargetStmtKind::For { init, cond, step, body } => {
            if let Some(init) = init {
                exec_stmt(shared, init, frame)?;
            }
            loop {
                if let Some(cond) = cond {
                    if eval(shared, frame, cond)? == 0 {
                        return Ok(());
                    }
                }
                exec_stmt(shared, body, frame)?;
                if let Some(step) = step {
                    exec_stmt(shared, step, frame)?;
                }
            }
        }
        TargetStmtKind::Switch { .. } => Err(RuntimeError::Unsupported("switch".to_string())),
        TargetStmtKind::Code(code) => call(shared, code, frame),
        TargetStmtKind::Empty => Ok(()),
    }
}

fn call(shared: &Shared, code: &HostCode, frame: &Frame) -> Result<(), RuntimeError> {
    let kernel = shared
        .kernels
        .read()
        .get(&code.label)
        .cloned()
        .ok_or_else(|| RuntimeError::UnknownKernel(code.label.clone()))?;
    log::trace!("running `{}` on the {}", code.label, if frame.on_device { "device" } else { "host" });
    kernel(&KernelContext::new(shared, frame))
}

fn eval(shared: &Shared, frame: &Frame, expr: &Expr) -> Result<i64, RuntimeError> {
    match &expr.kind {
        ExprKind::DeclRef(id) => {
            let identity = VariableIdentity::Plain(shared.decls.canonical(*id));
            frame.load(shared, &identity, shared.decls.name(*id), 0)
        }
        ExprKind::Subscript { base, index } => {
            let &ExprKind::DeclRef(id) = &base.ignore_parens().kind else {
                return Err(RuntimeError::Unsupported(expr.display(&shared.decls).to_string()));
            };
            let index = eval(shared, frame, index)?;
            let identity = VariableIdentity::Plain(shared.decls.canonical(id));
            frame.load(shared, &identity, shared.decls.name(id), index)
        }
        ExprKind::IntLiteral(value) => Ok(*value),
        ExprKind::Neg(inner) => Ok(eval(shared, frame, inner)?.wrapping_neg()),
        ExprKind::Binary { op, lhs, rhs } => Ok(op.apply(eval(shared, frame, lhs)?, eval(shared, frame, rhs)?)),
        ExprKind::Paren(inner) => eval(shared, frame, inner),
        _ => Err(RuntimeError::Unsupported(expr.display(&shared.decls).to_string())),
    }
}

fn exec_directive(shared: &Arc<Shared>, directive: &TargetDirective, frame: &Frame) -> Result<(), RuntimeError> {
    if directive.kind == TargetDirectiveKind::Taskwait {
        let depends = evaluate_depends(shared, frame, directive)?;
        log::debug!("taskwait on {depends:?}");
        shared.scheduler.wait(&depends);
        return Ok(());
    }
    if !directive.is_nowait() {
        return run_construct(shared, directive, frame);
    }
    let depends = evaluate_depends(shared, frame, directive)?;
    let task = shared.clone();
    let owned = directive.clone();
    let frame = frame.clone();
    shared
        .scheduler
        .spawn(directive.kind.as_str().to_string(), &depends, move || {
            run_construct(&task, &owned, &frame)
        });
    Ok(())
}

/// Dependencies with their queue arguments evaluated now, at issue time.
fn evaluate_depends(shared: &Shared, frame: &Frame, directive: &TargetDirective) -> Result<Vec<(DependKind, i64)>, RuntimeError> {
    directive
        .depends()
        .map(|depend| {
            let value = match &depend.arg {
                TokenArg::Literal(value) => *value,
                TokenArg::Runtime { expr, .. } => eval(shared, frame, expr)?,
            };
            Ok((depend.kind, queue_key(value)))
        })
        .collect()
}

fn run_body(shared: &Arc<Shared>, directive: &TargetDirective, frame: &Frame) -> Result<(), RuntimeError> {
    match &directive.body {
        Some(body) => exec_stmt(shared, body, frame),
        None => Ok(()),
    }
}

fn run_construct(shared: &Arc<Shared>, directive: &TargetDirective, frame: &Frame) -> Result<(), RuntimeError> {
    let enabled = match directive.if_condition() {
        Some(cond) => eval(shared, frame, cond)? != 0,
        None => true,
    };
    log::debug!("{directive}{}", if enabled { "" } else { " (disabled)" });
    match directive.kind {
        TargetDirectiveKind::TargetData | TargetDirectiveKind::TargetTeams | TargetDirectiveKind::TargetTeamsDistribute
            if !enabled =>
        {
            run_body(shared, directive, frame)
        }
        TargetDirectiveKind::TargetData | TargetDirectiveKind::TargetTeams | TargetDirectiveKind::TargetTeamsDistribute => {
            run_region(shared, directive, frame)
        }
        _ if !enabled => Ok(()),
        TargetDirectiveKind::TargetEnterData => {
            for (map, operand) in directive.mapped_operands() {
                let (section, host) = section_of(shared, operand)?;
                shared.device.enter(section, map, &host)?;
            }
            Ok(())
        }
        TargetDirectiveKind::TargetExitData => {
            for (map, operand) in directive.mapped_operands() {
                let (section, host) = section_of(shared, operand)?;
                shared.device.exit(section, map, &host)?;
            }
            Ok(())
        }
        TargetDirectiveKind::TargetUpdate => {
            for clause in &directive.clauses {
                let TargetClause::Motion { motion, operands } = clause else {
                    continue;
                };
                for operand in operands {
                    let (section, host) = section_of(shared, operand)?;
                    shared.device.update(section, motion.direction, motion.present, &host)?;
                }
            }
            Ok(())
        }
        TargetDirectiveKind::Distribute => run_body(shared, directive, frame),
        TargetDirectiveKind::Taskwait => {
            let depends = evaluate_depends(shared, frame, directive)?;
            shared.scheduler.wait(&depends);
            Ok(())
        }
    }
}

/// A structured construct: maps on entry, the body, maps on exit.
/// Offloaded bodies see their mapped and private storage in a device frame.
/// Maps the operands in order, runs the body, then unmaps in reverse.
/// Whatever was mapped before a failure is unmapped before the failure
/// propagates.
fn run_region(shared: &Arc<Shared>, directive: &TargetDirective, frame: &Frame) -> Result<(), RuntimeError> {
    let mapped: Vec<_> = directive.mapped_operands().collect();
    let mut views = FxHashMap::default();
    let mut entered = 0;
    let mut outcome = Ok(());
    for &(map, operand) in &mapped {
        let result = section_of(shared, operand).and_then(|(section, host)| shared.device.enter(section, map, &host));
        match result {
            Ok(view) => {
                if let Some(view) = view {
                    views.insert(operand.identity.clone(), view);
                }
                entered += 1;
            }
            Err(err) => {
                outcome = Err(err);
                break;
            }
        }
    }

    if outcome.is_ok() {
        outcome = if directive.kind.is_offload() {
            offload_frame(shared, directive, frame, views).and_then(|device| run_body(shared, directive, &device))
        } else {
            run_body(shared, directive, frame)
        };
    }

    let exited = exit_mapped(shared, &mapped[..entered]);
    outcome.and(exited)
}

/// Device views plus a private snapshot of every firstprivate operand.
fn offload_frame(
    shared: &Shared,
    directive: &TargetDirective,
    frame: &Frame,
    mut views: FxHashMap<VariableIdentity, View>,
) -> Result<Frame, RuntimeError> {
    for clause in &directive.clauses {
        let TargetClause::Firstprivate(operands) = clause else {
            continue;
        };
        for operand in operands {
            let private = frame
                .resolve(shared, &operand.identity, 0)
                .ok_or_else(|| RuntimeError::UnknownVariable(operand.text.clone()))?
                .snapshot();
            views.insert(operand.identity.clone(), private);
        }
    }
    Ok(Frame::device(views))
}

/// Unmaps `mapped` in reverse and reports the first failure.
fn exit_mapped(shared: &Shared, mapped: &[(&MapDescriptor, &TargetOperand)]) -> Result<(), RuntimeError> {
    let mut first = None;
    for &(map, operand) in mapped.iter().rev() {
        let result = section_of(shared, operand).and_then(|(section, host)| shared.device.exit(section, map, &host));
        if let Err(err) = result {
            log::warn!("unmapping `{}` failed: {err}", operand.text);
            first.get_or_insert(err);
        }
    }
    first.map_or(Ok(()), Err)
}

fn section_of<'a>(shared: &Shared, operand: &'a TargetOperand) -> Result<(Section<'a>, View), RuntimeError> {
    let host = shared
        .host
        .view(&operand.identity)
        .ok_or_else(|| RuntimeError::UnknownVariable(operand.text.clone()))?;
    let (start, len) = match operand.range {
        DataRange::Whole => (0, host.len()),
        DataRange::Bounded { start, len } => (start, len),
        DataRange::Unbounded => return Err(RuntimeError::Unsupported(operand.text.clone())),
    };
    Ok((
        Section {
            identity: &operand.identity,
            start,
            len,
            text: &operand.text,
        },
        host,
    ))
}

#[cfg(test)]
mod tests {
    use accord_ast::{BinaryOp, Shape};
    use miette::{SourceOffset, SourceSpan};

    use super::*;

    fn span() -> SourceSpan {
        SourceSpan::new(SourceOffset::from(0), 0)
    }

    #[test]
    fn evaluates_conditions_from_host_memory() {
        let mut decls = DeclTable::new();
        let n = decls.variable("n", Shape::Scalar, span());
        let a = decls.variable("a", Shape::Array(Some(3)), span());
        let executor = Executor::new(decls);
        executor.define("n", &[4]).unwrap();
        executor.define("a", &[1, 2, 3]).unwrap();

        let cond = Expr::binary(
            BinaryOp::Eq,
            Expr::subscript(Expr::decl_ref(a, span()), Expr::int(2, span()), span()),
            Expr::paren(
                Expr::binary(BinaryOp::Sub, Expr::decl_ref(n, span()), Expr::int(1, span()), span()),
                span(),
            ),
            span(),
        );
        assert_eq!(eval(&executor.shared, &Frame::host(), &cond), Ok(1));
        assert_eq!(
            eval(&executor.shared, &Frame::host(), &Expr::call("f", vec![], span())),
            Err(RuntimeError::Unsupported("f()".to_string()))
        );
    }

    #[test]
    fn unbound_code_is_reported() {
        let executor = Executor::new(DeclTable::new());
        let stmt = TargetStmt::new(
            TargetStmtKind::Code(HostCode {
                label: "missing".to_string(),
                refs: vec![],
            }),
            span(),
        );
        assert_eq!(executor.run(&stmt), Err(RuntimeError::UnknownKernel("missing".to_string())));
    }
}
