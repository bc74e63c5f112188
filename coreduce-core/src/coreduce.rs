//! Co-Reduce keeps a running reduction per input of a two-input stream and emits the mapped
//! reduction downstream after every record. Watermarks of both inputs are combined with
//! [CombinedWatermark] so the downstream only sees a watermark that is safe for both inputs.

use tracing::debug;

use crate::error::Result;
use crate::message::{Input, Record, Watermark};
use crate::output::Output;
use crate::watermark::CombinedWatermark;

/// User-defined logic of a co-reduce. Errors returned from any of these functions are propagated
/// to the caller of the operator unchanged.
pub trait CoReduceFunction<IN1, IN2, OUT> {
    /// Folds a record of the first input into the current reduction.
    fn reduce1(&mut self, accumulated: &IN1, incoming: IN1) -> Result<IN1>;

    /// Folds a record of the second input into the current reduction.
    fn reduce2(&mut self, accumulated: &IN2, incoming: IN2) -> Result<IN2>;

    /// Maps the reduction of the first input to the output value.
    fn map1(&mut self, accumulated: &IN1) -> Result<OUT>;

    /// Maps the reduction of the second input to the output value.
    fn map2(&mut self, accumulated: &IN2) -> Result<OUT>;
}

/// [CoReduceFunction] built from four closures.
pub struct FnCoReduce<R1, R2, M1, M2> {
    reduce1: R1,
    reduce2: R2,
    map1: M1,
    map2: M2,
}

impl<R1, R2, M1, M2> FnCoReduce<R1, R2, M1, M2> {
    pub fn new<IN1, IN2, OUT>(reduce1: R1, reduce2: R2, map1: M1, map2: M2) -> Self
    where
        R1: FnMut(&IN1, IN1) -> Result<IN1>,
        R2: FnMut(&IN2, IN2) -> Result<IN2>,
        M1: FnMut(&IN1) -> Result<OUT>,
        M2: FnMut(&IN2) -> Result<OUT>,
    {
        Self {
            reduce1,
            reduce2,
            map1,
            map2,
        }
    }
}

impl<IN1, IN2, OUT, R1, R2, M1, M2> CoReduceFunction<IN1, IN2, OUT> for FnCoReduce<R1, R2, M1, M2>
where
    R1: FnMut(&IN1, IN1) -> Result<IN1>,
    R2: FnMut(&IN2, IN2) -> Result<IN2>,
    M1: FnMut(&IN1) -> Result<OUT>,
    M2: FnMut(&IN2) -> Result<OUT>,
{
    fn reduce1(&mut self, accumulated: &IN1, incoming: IN1) -> Result<IN1> {
        (self.reduce1)(accumulated, incoming)
    }

    fn reduce2(&mut self, accumulated: &IN2, incoming: IN2) -> Result<IN2> {
        (self.reduce2)(accumulated, incoming)
    }

    fn map1(&mut self, accumulated: &IN1) -> Result<OUT> {
        (self.map1)(accumulated)
    }

    fn map2(&mut self, accumulated: &IN2) -> Result<OUT> {
        (self.map2)(accumulated)
    }
}

/// An operator with two inputs. Calls are expected to be made one at a time; the operator does
/// no synchronization of its own.
pub trait TwoInputOperator<IN1, IN2, OUT> {
    fn process_element1<O: Output<OUT>>(
        &mut self,
        record: Record<IN1>,
        output: &mut O,
    ) -> Result<()>;

    fn process_element2<O: Output<OUT>>(
        &mut self,
        record: Record<IN2>,
        output: &mut O,
    ) -> Result<()>;

    fn process_watermark1<O: Output<OUT>>(
        &mut self,
        watermark: Watermark,
        output: &mut O,
    ) -> Result<()>;

    fn process_watermark2<O: Output<OUT>>(
        &mut self,
        watermark: Watermark,
        output: &mut O,
    ) -> Result<()>;
}

/// Keeps at most one reduction per input and the combined watermark of both inputs.
pub struct CoStreamReduce<F, IN1, IN2> {
    function: F,
    /// reduction of the first input, `None` till its first record.
    current_value1: Option<IN1>,
    /// reduction of the second input, `None` till its first record.
    current_value2: Option<IN2>,
    watermarks: CombinedWatermark,
}

impl<F, IN1, IN2> CoStreamReduce<F, IN1, IN2> {
    pub fn new(function: F) -> Self {
        Self {
            function,
            current_value1: None,
            current_value2: None,
            watermarks: CombinedWatermark::new(),
        }
    }

    pub fn current_value1(&self) -> Option<&IN1> {
        self.current_value1.as_ref()
    }

    pub fn current_value2(&self) -> Option<&IN2> {
        self.current_value2.as_ref()
    }

    /// The highest combined watermark published so far.
    pub fn combined_watermark(&self) -> Option<Watermark> {
        self.watermarks.last_emitted()
    }

    fn process_watermark<OUT, O: Output<OUT>>(
        &mut self,
        input: Input,
        watermark: Watermark,
        output: &mut O,
    ) -> Result<()> {
        match self.watermarks.observe(input, watermark) {
            Some(combined) => {
                debug!(%input, combined = combined.timestamp_millis(), "Combined watermark advanced");
                output.emit_watermark(combined)
            }
            None => Ok(()),
        }
    }
}

/// Folds `incoming` into `current`. The first value is stored as is, the reduce function is only
/// invoked from the second value onwards. On error `current` is left untouched.
fn fold<'a, T>(
    current: &'a mut Option<T>,
    incoming: T,
    reduce: impl FnOnce(&T, T) -> Result<T>,
) -> Result<&'a T> {
    let next = match current.as_ref() {
        Some(accumulated) => reduce(accumulated, incoming)?,
        None => incoming,
    };
    Ok(current.insert(next))
}

impl<F, IN1, IN2, OUT> TwoInputOperator<IN1, IN2, OUT> for CoStreamReduce<F, IN1, IN2>
where
    F: CoReduceFunction<IN1, IN2, OUT>,
{
    fn process_element1<O: Output<OUT>>(
        &mut self,
        record: Record<IN1>,
        output: &mut O,
    ) -> Result<()> {
        let (value, envelope) = record.into_parts();
        let function = &mut self.function;
        let accumulated = fold(&mut self.current_value1, value, |acc, v| {
            function.reduce1(acc, v)
        })?;
        let mapped = function.map1(accumulated)?;
        output.collect(envelope.replace(mapped))
    }

    fn process_element2<O: Output<OUT>>(
        &mut self,
        record: Record<IN2>,
        output: &mut O,
    ) -> Result<()> {
        let (value, envelope) = record.into_parts();
        let function = &mut self.function;
        let accumulated = fold(&mut self.current_value2, value, |acc, v| {
            function.reduce2(acc, v)
        })?;
        let mapped = function.map2(accumulated)?;
        output.collect(envelope.replace(mapped))
    }

    fn process_watermark1<O: Output<OUT>>(
        &mut self,
        watermark: Watermark,
        output: &mut O,
    ) -> Result<()> {
        self.process_watermark(Input::First, watermark, output)
    }

    fn process_watermark2<O: Output<OUT>>(
        &mut self,
        watermark: Watermark,
        output: &mut O,
    ) -> Result<()> {
        self.process_watermark(Input::Second, watermark, output)
    }
}
