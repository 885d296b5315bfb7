//! Arithmetic processes and the math pipeline.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::core::{AtomicProcess, Composition, OrchestratedProcess, Process};
use crate::domain::{ExecutionContext, Parameter, ParameterSet, ValueType};

/// `sum = a + b`
#[derive(Debug, Default)]
pub struct Add;

#[async_trait]
impl AtomicProcess for Add {
    fn define_parameters(&self, input: &mut ParameterSet, output: &mut ParameterSet) {
        input
            .add(Parameter::new("a", ValueType::Int).with_description("First operand"))
            .add(Parameter::new("b", ValueType::Int).with_description("Second operand"));
        output.add(Parameter::new("sum", ValueType::Int).with_description("a + b"));
    }

    async fn execute_impl(&self, input: &ParameterSet, output: &mut ParameterSet) -> Result<()> {
        let a = input.int("a")?;
        let b = input.int("b")?;
        match a.checked_add(b) {
            Some(sum) => output.set("sum", sum)?,
            None => bail!("Integer overflow adding {} and {}", a, b),
        }
        Ok(())
    }

    fn description(&self) -> &str {
        "Add two integers"
    }
}

/// `result = number * factor`
#[derive(Debug, Default)]
pub struct Multiply;

#[async_trait]
impl AtomicProcess for Multiply {
    fn define_parameters(&self, input: &mut ParameterSet, output: &mut ParameterSet) {
        input
            .add(Parameter::new("number", ValueType::Int))
            .add(Parameter::new("factor", ValueType::Int));
        output.add(Parameter::new("result", ValueType::Int));
    }

    async fn execute_impl(&self, input: &ParameterSet, output: &mut ParameterSet) -> Result<()> {
        let number = input.int("number")?;
        let factor = input.int("factor")?;
        match number.checked_mul(factor) {
            Some(result) => output.set("result", result)?,
            None => bail!("Integer overflow multiplying {} by {}", number, factor),
        }
        Ok(())
    }

    fn description(&self) -> &str {
        "Multiply an integer by a factor"
    }
}

/// `avg = sum / count`, zero when count is zero
#[derive(Debug, Default)]
pub struct Average;

#[async_trait]
impl AtomicProcess for Average {
    fn define_parameters(&self, input: &mut ParameterSet, output: &mut ParameterSet) {
        input
            .add(Parameter::new("sum", ValueType::Int))
            .add(Parameter::new("count", ValueType::Int));
        output.add(Parameter::new("avg", ValueType::Float));
    }

    async fn execute_impl(&self, input: &ParameterSet, output: &mut ParameterSet) -> Result<()> {
        let sum = input.int("sum")?;
        let count = input.int("count")?;
        let avg = if count == 0 {
            0.0
        } else {
            sum as f64 / count as f64
        };
        output.set("avg", avg)?;
        Ok(())
    }

    fn description(&self) -> &str {
        "Average of a sum over a count"
    }
}

/// `result = value * factor` on floats
#[derive(Debug, Default)]
pub struct Scale;

#[async_trait]
impl AtomicProcess for Scale {
    fn define_parameters(&self, input: &mut ParameterSet, output: &mut ParameterSet) {
        input
            .add(Parameter::new("value", ValueType::Float))
            .add(Parameter::new("factor", ValueType::Float).with_default(1.0));
        output.add(Parameter::new("result", ValueType::Float));
    }

    async fn execute_impl(&self, input: &ParameterSet, output: &mut ParameterSet) -> Result<()> {
        output.set("result", input.float("value")? * input.float("factor")?)?;
        Ok(())
    }

    fn description(&self) -> &str {
        "Scale a number by a factor"
    }
}

/// Always fails with `message`
#[derive(Debug, Default)]
pub struct Fail;

#[async_trait]
impl AtomicProcess for Fail {
    fn define_parameters(&self, input: &mut ParameterSet, _output: &mut ParameterSet) {
        input.add(
            Parameter::new("message", ValueType::Str)
                .optional()
                .with_default("Intentional failure"),
        );
    }

    async fn execute_impl(&self, input: &ParameterSet, _output: &mut ParameterSet) -> Result<()> {
        bail!("{}", input.str("message")?)
    }

    fn description(&self) -> &str {
        "Fail with the given message"
    }
}

/// Waits `delay_ms` milliseconds
#[derive(Debug, Default)]
pub struct Sleep;

#[async_trait]
impl AtomicProcess for Sleep {
    fn define_parameters(&self, input: &mut ParameterSet, output: &mut ParameterSet) {
        input.add(Parameter::new("delay_ms", ValueType::Int).with_default(100));
        output.add(Parameter::new("slept_ms", ValueType::Int));
    }

    async fn execute_impl(&self, input: &ParameterSet, output: &mut ParameterSet) -> Result<()> {
        let delay_ms = input.int("delay_ms")?;
        if delay_ms < 0 {
            bail!("delay_ms must not be negative, got {}", delay_ms);
        }
        tokio::time::sleep(Duration::from_millis(delay_ms as u64)).await;
        output.set("slept_ms", delay_ms)?;
        Ok(())
    }

    fn description(&self) -> &str {
        "Sleep for a number of milliseconds"
    }

    fn context(&self) -> ExecutionContext {
        ExecutionContext::default().with_complexity(0.1)
    }
}

/// `(a + b) / 2 * factor`, as Add -> Average -> Scale
#[derive(Debug, Default)]
pub struct MathPipeline;

impl OrchestratedProcess for MathPipeline {
    fn define_parameters(&self, input: &mut ParameterSet, output: &mut ParameterSet) {
        input
            .add(Parameter::new("a", ValueType::Int))
            .add(Parameter::new("b", ValueType::Int))
            .add(Parameter::new("factor", ValueType::Float));
        output.add(Parameter::new("result", ValueType::Float));
    }

    fn orchestrate(&self, plan: &mut Composition) -> Result<()> {
        let add = plan.sequential(Process::atomic(Add));
        plan.connect(plan.input("a"), add.input("a"));
        plan.connect(plan.input("b"), add.input("b"));

        let mut average = Process::atomic(Average);
        average.input_mut().set("count", 2)?;
        let average = plan.sequential(average);
        plan.connect(add.output("sum"), average.input("sum"));

        let scale = plan.sequential(Process::atomic(Scale));
        plan.connect(average.output("avg"), scale.input("value"));
        plan.connect(plan.input("factor"), scale.input("factor"));

        plan.connect(scale.output("result"), plan.output("result"));
        Ok(())
    }

    fn description(&self) -> &str {
        "Add two numbers, average them, scale by a factor"
    }
}
