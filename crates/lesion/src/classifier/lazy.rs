use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::{
    error::{LesionError, Result},
    traits::{Classifier, ModelLoader},
    types::{ClassifierPrediction, ImageBuffer},
};

/// Classifier whose model is loaded on first use and shared afterwards.
///
/// Concurrent first callers wait on the single in-flight load instead of
/// starting their own. A failed load leaves the cell empty so the next call
/// retries.
pub struct LazyClassifier {
    loader: Box<dyn ModelLoader>,
    model: OnceCell<Arc<dyn Classifier>>,
    name: String,
}

impl LazyClassifier {
    pub fn new<L>(loader: L) -> Self
    where
        L: ModelLoader + 'static,
    {
        let name = format!("lazy({})", loader.describe());
        Self {
            loader: Box::new(loader),
            model: OnceCell::new(),
            name,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// The loaded model, loading it if nobody has yet
    pub async fn model(&self) -> Result<&Arc<dyn Classifier>> {
        self.model
            .get_or_try_init(|| async {
                info!(model = %self.loader.describe(), "Loading classifier model");
                match self.loader.load().await {
                    Ok(model) => Ok(model),
                    Err(err) => {
                        warn!(model = %self.loader.describe(), %err, "Classifier model failed to load");
                        Err(match err {
                            unavailable @ LesionError::ClassifierUnavailable { .. } => unavailable,
                            other => LesionError::classifier_unavailable(format!(
                                "failed to load {}: {other}",
                                self.loader.describe()
                            )),
                        })
                    }
                }
            })
            .await
    }
}

#[async_trait]
impl Classifier for LazyClassifier {
    async fn classify(&self, image: &ImageBuffer) -> Result<Vec<ClassifierPrediction>> {
        let model = self.model().await?;
        model.classify(image).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::FixedClassifier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::task::JoinSet;

    struct CountingLoader {
        loads: Arc<AtomicUsize>,
        fail_first: bool,
    }

    #[async_trait]
    impl ModelLoader for CountingLoader {
        async fn load(&self) -> Result<Arc<dyn Classifier>> {
            let attempt = self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.fail_first && attempt == 0 {
                return Err(LesionError::classifier_unavailable("weights not ready"));
            }
            Ok(Arc::new(FixedClassifier::new(vec![ClassifierPrediction::new("mole", 0.6)])))
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    fn image() -> ImageBuffer {
        ImageBuffer::new(1, 1, vec![120, 80, 60, 255]).expect("valid image")
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_load() {
        let loads = Arc::new(AtomicUsize::new(0));
        let classifier = Arc::new(LazyClassifier::new(CountingLoader {
            loads: loads.clone(),
            fail_first: false,
        }));
        assert!(!classifier.is_loaded());

        let mut set = JoinSet::new();
        for _ in 0..8 {
            let classifier = classifier.clone();
            set.spawn(async move { classifier.classify(&image()).await });
        }
        while let Some(joined) = set.join_next().await {
            let predictions = joined.expect("task completes").expect("classification succeeds");
            assert_eq!(predictions[0].label, "mole");
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(classifier.is_loaded());
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let loads = Arc::new(AtomicUsize::new(0));
        let classifier = LazyClassifier::new(CountingLoader {
            loads: loads.clone(),
            fail_first: true,
        });

        let err = classifier.classify(&image()).await.unwrap_err();
        assert!(matches!(err, LesionError::ClassifierUnavailable { .. }));
        assert!(!classifier.is_loaded());

        let predictions = classifier.classify(&image()).await.expect("second load succeeds");
        assert_eq!(predictions.len(), 1);
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }
}
