//! Two queues and the host handing work to each other through device
//! memory. Every construct can only finish if the others make progress
//! concurrently, and each queue still has to run its constructs in order.

use accord_ast::{AccDirectiveKind, BinaryOp, DataClauseKind, DeclTable, Expr, Shape, Stmt};
use accord_rt::{Executor, KernelContext, RuntimeError};

mod common;
use common::*;

#[derive(Clone, Copy)]
enum Queues {
    Literal,
    Variable,
}

fn program(decls: &mut DeclTable, queues: Queues) -> Stmt {
    let x = decls.variable("x", Shape::Scalar, dummy_span());
    let y = decls.variable("y", Shape::Scalar, dummy_span());
    let z = decls.variable("z", Shape::Scalar, dummy_span());
    let (q0, q1) = match queues {
        Queues::Literal => (int(0), int(1)),
        Queues::Variable => {
            let q0 = decls.variable("q0", Shape::Scalar, dummy_span());
            let q1 = decls.variable("q1", Shape::Scalar, dummy_span());
            (var(q0), var(q1))
        }
    };
    let is_zero = |id| Expr::binary(BinaryOp::Eq, var(id), int(0), dummy_span());
    let poll = |id| {
        Stmt::while_loop(
            is_zero(id),
            seq(vec![standalone(
                AccDirectiveKind::Update,
                vec![clause(DataClauseKind::Host, vec![var(id)])],
            )]),
            dummy_span(),
        )
    };

    seq(vec![
        standalone(
            AccDirectiveKind::EnterData,
            vec![clause(DataClauseKind::Copyin, vec![var(x), var(y), var(z)])],
        ),
        region(
            AccDirectiveKind::Parallel,
            vec![clause(DataClauseKind::Present, vec![var(x), var(y), var(z)]), on_queue(q0.clone())],
            code("first", vec![var(x), var(y), var(z)]),
        ),
        region(
            AccDirectiveKind::Parallel,
            vec![clause(DataClauseKind::Present, vec![var(x), var(y), var(z)]), on_queue(q1.clone())],
            code("second", vec![var(x), var(y), var(z)]),
        ),
        region(
            AccDirectiveKind::Parallel,
            vec![clause(DataClauseKind::Present, vec![var(x)]), on_queue(q0)],
            code("third", vec![var(x)]),
        ),
        region(
            AccDirectiveKind::Parallel,
            vec![clause(DataClauseKind::Present, vec![var(y)]), on_queue(q1)],
            code("fourth", vec![var(y)]),
        ),
        code("release", vec![var(z)]),
        standalone(AccDirectiveKind::Update, vec![clause(DataClauseKind::Device, vec![var(z)])]),
        poll(y),
        poll(x),
        wait_all(),
        standalone(
            AccDirectiveKind::ExitData,
            vec![clause(DataClauseKind::Copyout, vec![var(x), var(y)])],
        ),
    ])
}

fn on_device(ctx: &KernelContext<'_>) -> Result<(), RuntimeError> {
    if ctx.on_device() {
        Ok(())
    } else {
        Err(RuntimeError::Kernel("kernel ran on the host".to_string()))
    }
}

fn nonzero(name: &'static str) -> impl FnMut(&KernelContext<'_>) -> Result<bool, RuntimeError> {
    move |ctx| Ok(ctx.get(name)? != 0)
}

fn bind_kernels(executor: &Executor) {
    executor.bind("first", |ctx| {
        on_device(ctx)?;
        ctx.wait_until(nonzero("z"))?;
        ctx.wait_until(nonzero("y"))?;
        ctx.set("x", ctx.get("x")? * 10 + 1)
    });
    executor.bind("second", |ctx| {
        on_device(ctx)?;
        ctx.wait_until(nonzero("z"))?;
        ctx.set("y", ctx.get("y")? * 10 + 1)?;
        ctx.wait_until(nonzero("x"))
    });
    executor.bind("third", |ctx| {
        on_device(ctx)?;
        ctx.set("x", ctx.get("x")? * 10 + 2)
    });
    executor.bind("fourth", |ctx| {
        on_device(ctx)?;
        ctx.set("y", ctx.get("y")? * 10 + 2)
    });
    executor.bind("release", |ctx| ctx.set("z", 1));
}

fn run(queues: Queues) -> Executor {
    init_logging();
    let mut decls = DeclTable::new();
    let body = program(&mut decls, queues);
    let translated = translate(&decls, body);

    let executor = Executor::new(decls);
    if let Queues::Variable = queues {
        executor.define("q0", &[0]).unwrap();
        executor.define("q1", &[1]).unwrap();
    }
    bind_kernels(&executor);
    executor.run(&translated).unwrap();
    executor
}

fn assert_finished(executor: &Executor) {
    assert_eq!(executor.read("x").unwrap(), [12]);
    assert_eq!(executor.read("y").unwrap(), [12]);
    assert_eq!(executor.read("z").unwrap(), [1]);
    // `z` was copied in but never exited.
    assert_eq!(executor.device().len(), 1);
}

#[test]
fn literal_queues_run_concurrently_in_order() {
    assert_finished(&run(Queues::Literal));
}

#[test]
fn variable_queues_run_concurrently_in_order() {
    assert_finished(&run(Queues::Variable));
}

#[test]
fn synchronous_queue_value_blocks_the_host() {
    init_logging();
    let mut decls = DeclTable::new();
    let x = decls.variable("x", Shape::Scalar, dummy_span());
    let q = decls.variable("q", Shape::Scalar, dummy_span());
    let body = seq(vec![
        region(
            AccDirectiveKind::Parallel,
            vec![clause(DataClauseKind::Copy, vec![var(x)]), on_queue(var(q))],
            code("store", vec![var(x)]),
        ),
        code("check", vec![var(x)]),
    ]);
    let translated = translate(&decls, body);

    let executor = Executor::new(decls);
    executor.define("q", &[-1]).unwrap();
    executor.bind("store", |ctx| {
        std::thread::sleep(std::time::Duration::from_millis(20));
        ctx.set("x", 5)
    });
    executor.bind("check", |ctx| match ctx.get("x")? {
        5 => Ok(()),
        other => Err(RuntimeError::Kernel(format!("host saw {other} before the region finished"))),
    });
    executor.run(&translated).unwrap();
}
