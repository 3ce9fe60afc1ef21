use std::sync::Arc;

use evalforge_core::providers::embedder::Embedder;
use evalforge_core::scoring::Scorer;

mod bleu;
mod rouge;
mod semantic;
mod text;

pub use bleu::BleuScorer;
pub use rouge::RougeScorer;
pub use semantic::SemanticScorer;

/// The standard scorer set: BLEU and ROUGE always, semantic similarity only
/// when an embedder is configured. Without one, the semantic score stays
/// absent on every result and drops out of the averages.
pub fn default_scorers(embedder: Option<Arc<dyn Embedder>>) -> Vec<Arc<dyn Scorer>> {
    let mut scorers: Vec<Arc<dyn Scorer>> = vec![Arc::new(BleuScorer), Arc::new(RougeScorer)];
    if let Some(embedder) = embedder {
        scorers.push(Arc::new(SemanticScorer::new(embedder)));
    }
    scorers
}
