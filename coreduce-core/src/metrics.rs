//! Prometheus metrics of the co-reduce operator. All metrics live in a single global registry
//! under the [REGISTRY_PREFIX] prefix and are labelled with the operator name, so multiple
//! operators in the same process can share the registry.

use std::sync::OnceLock;

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

use crate::error::{Error, Result};
use crate::message::{Input, Record, Watermark};
use crate::output::Output;

const REGISTRY_PREFIX: &str = "coreduce";

const OPERATOR_LABEL: &str = "operator";
const INPUT_LABEL: &str = "input";

const RECORDS_IN: &str = "records_in";
const RECORDS_OUT: &str = "records_out";
const WATERMARKS_IN: &str = "watermarks_in";
const WATERMARKS_OUT: &str = "watermarks_out";
const COMBINED_WATERMARK: &str = "combined_watermark";

type Labels = Vec<(String, String)>;

/// The global register of all metrics.
struct GlobalRegistry {
    // It is okay to use a blocking mutex because we register each metric only one time.
    registry: parking_lot::Mutex<Registry>,
}

impl GlobalRegistry {
    fn new() -> Self {
        GlobalRegistry {
            registry: parking_lot::Mutex::new(Registry::default()),
        }
    }
}

static GLOBAL_REGISTRY: OnceLock<GlobalRegistry> = OnceLock::new();

fn global_registry() -> &'static GlobalRegistry {
    GLOBAL_REGISTRY.get_or_init(GlobalRegistry::new)
}

pub struct CoReduceMetrics {
    pub records_in: Family<Labels, Counter>,
    pub records_out: Family<Labels, Counter>,
    pub watermarks_in: Family<Labels, Counter>,
    pub watermarks_out: Family<Labels, Counter>,
    pub combined_watermark: Family<Labels, Gauge>,
}

impl CoReduceMetrics {
    fn new() -> Self {
        let metrics = Self {
            records_in: Family::<Labels, Counter>::default(),
            records_out: Family::<Labels, Counter>::default(),
            watermarks_in: Family::<Labels, Counter>::default(),
            watermarks_out: Family::<Labels, Counter>::default(),
            combined_watermark: Family::<Labels, Gauge>::default(),
        };

        let mut registry = global_registry().registry.lock();
        let registry = registry.sub_registry_with_prefix(REGISTRY_PREFIX);
        registry.register(
            RECORDS_IN,
            "A Counter to keep track of the total number of records read per input",
            metrics.records_in.clone(),
        );
        registry.register(
            RECORDS_OUT,
            "A Counter to keep track of the total number of reduced records emitted",
            metrics.records_out.clone(),
        );
        registry.register(
            WATERMARKS_IN,
            "A Counter to keep track of the total number of watermarks read per input",
            metrics.watermarks_in.clone(),
        );
        registry.register(
            WATERMARKS_OUT,
            "A Counter to keep track of the total number of combined watermarks emitted",
            metrics.watermarks_out.clone(),
        );
        registry.register(
            COMBINED_WATERMARK,
            "A Gauge to keep track of the last combined watermark emitted",
            metrics.combined_watermark.clone(),
        );
        metrics
    }
}

static COREDUCE_METRICS: OnceLock<CoReduceMetrics> = OnceLock::new();

pub fn coreduce_metrics() -> &'static CoReduceMetrics {
    COREDUCE_METRICS.get_or_init(CoReduceMetrics::new)
}

pub(crate) fn operator_labels(operator: &str) -> Labels {
    vec![(OPERATOR_LABEL.to_string(), operator.to_string())]
}

pub(crate) fn input_labels(operator: &str, input: Input) -> Labels {
    vec![
        (OPERATOR_LABEL.to_string(), operator.to_string()),
        (INPUT_LABEL.to_string(), input.as_str().to_string()),
    ]
}

/// Renders all registered metrics in the OpenMetrics text format.
pub fn metrics_text() -> Result<String> {
    // make sure the metrics are registered even if nothing was recorded yet
    coreduce_metrics();
    let mut buffer = String::new();
    let registry = global_registry().registry.lock();
    encode(&mut buffer, &registry)
        .map_err(|e| Error::Metrics(format!("failed to encode metrics: {e}")))?;
    Ok(buffer)
}

/// Counts what the wrapped [Output] receives.
pub(crate) struct MeteredOutput<'a, O> {
    inner: &'a mut O,
    labels: &'a Labels,
}

impl<'a, O> MeteredOutput<'a, O> {
    pub(crate) fn new(inner: &'a mut O, labels: &'a Labels) -> Self {
        Self { inner, labels }
    }
}

impl<O, OUT> Output<OUT> for MeteredOutput<'_, O>
where
    O: Output<OUT>,
{
    fn collect(&mut self, record: Record<OUT>) -> Result<()> {
        self.inner.collect(record)?;
        coreduce_metrics()
            .records_out
            .get_or_create(self.labels)
            .inc();
        Ok(())
    }

    fn emit_watermark(&mut self, watermark: Watermark) -> Result<()> {
        self.inner.emit_watermark(watermark)?;
        let metrics = coreduce_metrics();
        metrics.watermarks_out.get_or_create(self.labels).inc();
        metrics
            .combined_watermark
            .get_or_create(self.labels)
            .set(watermark.timestamp_millis());
        Ok(())
    }
}
