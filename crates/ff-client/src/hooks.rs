use std::collections::HashMap;

use ff_model::{Context, EvalDetail, Value};

/// Identifies a hook in error logs: `"hook 'x' failed in before stage"`.
pub trait HookMetadata {
    fn name(&self) -> &str;
}

#[derive(Clone, Debug)]
pub struct EvaluationSeriesContext {
    pub flag_key: String,
    pub context: Context,
    pub default_value: Value,
    pub method: &'static str,
}

/// Hook-local state threaded from the `before` stage to the matching `after`
/// stage for one evaluation. Hooks only see their own entries; there's no
/// cross-hook visibility.
#[derive(Clone, Debug, Default)]
pub struct SeriesData(HashMap<String, Value>);

impl SeriesData {
    pub fn new() -> SeriesData {
        SeriesData::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> SeriesData {
        self.0.insert(key.into(), value);
        self
    }
}

/// A hook runs `before` in registration order and `after` in reverse
/// registration order, bracketing the evaluation itself. Errors from either
/// stage are caught by the caller and logged by [`HookMetadata::name`]; they
/// never affect the evaluation result.
pub trait Hook: HookMetadata + Send + Sync {
    fn before_evaluation(&self, _ctx: &EvaluationSeriesContext, data: SeriesData) -> Result<SeriesData, String> {
        Ok(data)
    }

    fn after_evaluation(&self, _ctx: &EvaluationSeriesContext, data: SeriesData, _detail: &EvalDetail<Value>) -> Result<SeriesData, String> {
        Ok(data)
    }
}

pub struct HookRegistry {
    hooks: Vec<Box<dyn Hook>>,
}

impl HookRegistry {
    pub fn new(hooks: Vec<Box<dyn Hook>>) -> HookRegistry {
        HookRegistry { hooks }
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Runs `before` in registration order, evaluates via `evaluate`, then
    /// runs `after` in reverse order. A hook returning `Err` is logged by
    /// name and otherwise ignored; it never affects the evaluation result. A
    /// panic-free hook that returns isn't possible to enforce here; a hook
    /// that itself panics is the hook author's bug, not something this runs
    /// under `catch_unwind` for.
    pub fn run_evaluation(
        &self,
        series_ctx: &EvaluationSeriesContext,
        evaluate: impl FnOnce() -> EvalDetail<Value>,
    ) -> EvalDetail<Value> {
        let mut per_hook_data: Vec<SeriesData> = Vec::with_capacity(self.hooks.len());
        for hook in &self.hooks {
            let data = match hook.before_evaluation(series_ctx, SeriesData::new()) {
                Ok(data) => data,
                Err(err) => {
                    tracing::warn!(hook = %hook.name(), error = %err, "hook failed in before stage");
                    SeriesData::new()
                }
            };
            per_hook_data.push(data);
        }

        let detail = evaluate();

        for (hook, data) in self.hooks.iter().zip(per_hook_data.into_iter()).rev() {
            if let Err(err) = hook.after_evaluation(series_ctx, data, &detail) {
                tracing::warn!(hook = %hook.name(), error = %err, "hook failed in after stage");
            }
        }

        detail
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        HookRegistry::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct OrderRecorder {
        name: &'static str,
        order: Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl HookMetadata for OrderRecorder {
        fn name(&self) -> &str {
            self.name
        }
    }

    impl Hook for OrderRecorder {
        fn before_evaluation(&self, _ctx: &EvaluationSeriesContext, data: SeriesData) -> Result<SeriesData, String> {
            self.order.lock().unwrap().push(format!("{}:before", self.name));
            Ok(data)
        }

        fn after_evaluation(&self, _ctx: &EvaluationSeriesContext, data: SeriesData, _detail: &EvalDetail<Value>) -> Result<SeriesData, String> {
            self.order.lock().unwrap().push(format!("{}:after", self.name));
            Ok(data)
        }
    }

    struct FailingHook;

    impl HookMetadata for FailingHook {
        fn name(&self) -> &str {
            "failing"
        }
    }

    impl Hook for FailingHook {
        fn before_evaluation(&self, _ctx: &EvaluationSeriesContext, _data: SeriesData) -> Result<SeriesData, String> {
            Err("before stage blew up".to_string())
        }

        fn after_evaluation(&self, _ctx: &EvaluationSeriesContext, _data: SeriesData, _detail: &EvalDetail<Value>) -> Result<SeriesData, String> {
            Err("after stage blew up".to_string())
        }
    }

    fn series_ctx() -> EvaluationSeriesContext {
        EvaluationSeriesContext {
            flag_key: "flag".to_string(),
            context: Context::new("u1"),
            default_value: Value::from_bool(false),
            method: "boolVariation",
        }
    }

    #[test]
    fn before_runs_in_order_after_runs_in_reverse() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let registry = HookRegistry::new(vec![
            Box::new(OrderRecorder { name: "a", order: order.clone() }),
            Box::new(OrderRecorder { name: "b", order: order.clone() }),
        ]);
        let ctx = series_ctx();
        registry.run_evaluation(&ctx, || EvalDetail::new(Value::from_bool(true), Some(0), ff_model::Reason::Off));
        assert_eq!(*order.lock().unwrap(), vec!["a:before", "b:before", "b:after", "a:after"]);
    }

    #[test]
    fn failing_hook_is_swallowed_and_evaluation_still_completes() {
        let registry = HookRegistry::new(vec![Box::new(FailingHook)]);
        let ctx = series_ctx();
        let detail = registry.run_evaluation(&ctx, || EvalDetail::new(Value::from_bool(true), Some(0), ff_model::Reason::Off));
        assert_eq!(detail.value, Value::from_bool(true));
    }

    #[test]
    fn series_data_is_scoped_per_hook() {
        let mut data = SeriesData::new();
        data = data.with("k", Value::from_i64(1));
        assert_eq!(data.get("k"), Some(&Value::from_i64(1)));
        assert_eq!(data.get("missing"), None);
    }
}
