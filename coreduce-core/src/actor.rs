//! The operator itself is synchronous and must never be called concurrently. [CoReduceHandle]
//! gives it two independent asynchronous inputs: a single tokio task owns the operator and its
//! output and drains both input channels, so calls into the operator are serialized while the
//! producers of the two inputs run at their own pace.
//!
//! Order is preserved within an input. There is no ordering between the two inputs, which is
//! exactly what the watermark combination of the operator accounts for.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::CoReduceConfig;
use crate::coreduce::TwoInputOperator;
use crate::error::{Error, Result};
use crate::message::{Input, Record, Watermark};
use crate::metrics::{MeteredOutput, coreduce_metrics, input_labels, operator_labels};
use crate::output::Output;

/// What an upstream can deliver on one input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputMessage<T> {
    Record(Record<T>),
    Watermark(Watermark),
}

/// Sending half of one input of the operator. It is cheap to clone.
#[derive(Debug)]
pub struct InputSender<T> {
    input: Input,
    tx: mpsc::Sender<InputMessage<T>>,
}

impl<T> Clone for InputSender<T> {
    fn clone(&self) -> Self {
        Self {
            input: self.input,
            tx: self.tx.clone(),
        }
    }
}

impl<T> InputSender<T> {
    pub fn input(&self) -> Input {
        self.input
    }

    /// Sends a record, waits if the input buffer is full.
    pub async fn send_record(&self, record: Record<T>) -> Result<()> {
        self.send(InputMessage::Record(record)).await
    }

    /// Sends a watermark, waits if the input buffer is full.
    pub async fn send_watermark(&self, watermark: Watermark) -> Result<()> {
        self.send(InputMessage::Watermark(watermark)).await
    }

    async fn send(&self, message: InputMessage<T>) -> Result<()> {
        self.tx.send(message).await.map_err(|_| {
            Error::ActorPatternRecv(format!("{} is closed, co-reduce task stopped", self.input))
        })
    }
}

struct CoReduceActor<Op, O, IN1, IN2> {
    name: String,
    operator: Op,
    output: O,
    input1: mpsc::Receiver<InputMessage<IN1>>,
    input2: mpsc::Receiver<InputMessage<IN2>>,
    operator_labels: Vec<(String, String)>,
    input1_labels: Vec<(String, String)>,
    input2_labels: Vec<(String, String)>,
    cln_token: CancellationToken,
}

impl<Op, O, IN1, IN2> CoReduceActor<Op, O, IN1, IN2> {
    /// Runs till both inputs are closed, the token is cancelled or the operator fails.
    async fn run<OUT>(mut self) -> Result<()>
    where
        Op: TwoInputOperator<IN1, IN2, OUT>,
        O: Output<OUT>,
    {
        info!(operator = %self.name, "Starting co-reduce actor");

        let mut input1_open = true;
        let mut input2_open = true;
        while input1_open || input2_open {
            // branches are polled in random order so a busy input cannot starve the other one,
            // cancellation is checked up front instead of relying on branch order.
            if self.cln_token.is_cancelled() {
                info!(operator = %self.name, "Cancellation token received, stopping co-reduce actor");
                return Ok(());
            }
            tokio::select! {
                _ = self.cln_token.cancelled() => {
                    info!(operator = %self.name, "Cancellation token received, stopping co-reduce actor");
                    return Ok(());
                }
                message = self.input1.recv(), if input1_open => match message {
                    Some(message) => self.handle_input1::<OUT>(message)?,
                    None => {
                        info!(operator = %self.name, input = %Input::First, "Input closed");
                        input1_open = false;
                    }
                },
                message = self.input2.recv(), if input2_open => match message {
                    Some(message) => self.handle_input2::<OUT>(message)?,
                    None => {
                        info!(operator = %self.name, input = %Input::Second, "Input closed");
                        input2_open = false;
                    }
                },
            }
        }

        info!(operator = %self.name, "All inputs closed, stopping co-reduce actor");
        Ok(())
    }

    fn handle_input1<OUT>(&mut self, message: InputMessage<IN1>) -> Result<()>
    where
        Op: TwoInputOperator<IN1, IN2, OUT>,
        O: Output<OUT>,
    {
        let metrics = coreduce_metrics();
        let mut output = MeteredOutput::new(&mut self.output, &self.operator_labels);
        let result = match message {
            InputMessage::Record(record) => {
                metrics.records_in.get_or_create(&self.input1_labels).inc();
                self.operator.process_element1(record, &mut output)
            }
            InputMessage::Watermark(watermark) => {
                metrics.watermarks_in.get_or_create(&self.input1_labels).inc();
                self.operator.process_watermark1(watermark, &mut output)
            }
        };
        result.inspect_err(|e| {
            error!(?e, operator = %self.name, input = %Input::First, "Co-reduce failed");
        })
    }

    fn handle_input2<OUT>(&mut self, message: InputMessage<IN2>) -> Result<()>
    where
        Op: TwoInputOperator<IN1, IN2, OUT>,
        O: Output<OUT>,
    {
        let metrics = coreduce_metrics();
        let mut output = MeteredOutput::new(&mut self.output, &self.operator_labels);
        let result = match message {
            InputMessage::Record(record) => {
                metrics.records_in.get_or_create(&self.input2_labels).inc();
                self.operator.process_element2(record, &mut output)
            }
            InputMessage::Watermark(watermark) => {
                metrics.watermarks_in.get_or_create(&self.input2_labels).inc();
                self.operator.process_watermark2(watermark, &mut output)
            }
        };
        result.inspect_err(|e| {
            error!(?e, operator = %self.name, input = %Input::Second, "Co-reduce failed");
        })
    }
}

/// Handle to a running co-reduce task.
pub struct CoReduceHandle<IN1, IN2> {
    input1: InputSender<IN1>,
    input2: InputSender<IN2>,
    task: JoinHandle<Result<()>>,
}

impl<IN1, IN2> CoReduceHandle<IN1, IN2>
where
    IN1: Send + 'static,
    IN2: Send + 'static,
{
    /// Spawns the task owning `operator` and `output`. The task stops once every [InputSender] is
    /// dropped, when `cln_token` is cancelled, or on the first error.
    pub fn spawn<Op, O, OUT>(
        operator: Op,
        output: O,
        config: &CoReduceConfig,
        cln_token: CancellationToken,
    ) -> Self
    where
        Op: TwoInputOperator<IN1, IN2, OUT> + Send + 'static,
        O: Output<OUT> + Send + 'static,
        OUT: Send + 'static,
    {
        let (input1_tx, input1_rx) = mpsc::channel(config.input_buffer_size);
        let (input2_tx, input2_rx) = mpsc::channel(config.input_buffer_size);

        let actor = CoReduceActor {
            name: config.name.clone(),
            operator,
            output,
            input1: input1_rx,
            input2: input2_rx,
            operator_labels: operator_labels(&config.name),
            input1_labels: input_labels(&config.name, Input::First),
            input2_labels: input_labels(&config.name, Input::Second),
            cln_token,
        };
        let task = tokio::spawn(actor.run::<OUT>());

        Self {
            input1: InputSender {
                input: Input::First,
                tx: input1_tx,
            },
            input2: InputSender {
                input: Input::Second,
                tx: input2_tx,
            },
            task,
        }
    }
}

impl<IN1, IN2> CoReduceHandle<IN1, IN2> {
    pub fn input1(&self) -> InputSender<IN1> {
        self.input1.clone()
    }

    pub fn input2(&self) -> InputSender<IN2> {
        self.input2.clone()
    }

    /// Closes the inputs held by the handle and waits for the task to finish. Clones of the
    /// senders handed out earlier keep the task running until they are dropped too.
    pub async fn join(self) -> Result<()> {
        let CoReduceHandle {
            input1,
            input2,
            task,
        } = self;
        drop(input1);
        drop(input2);

        task.await
            .map_err(|e| Error::ActorPatternRecv(format!("co-reduce task failed to join: {e}")))?
    }
}
