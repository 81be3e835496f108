pub mod analytics;
pub mod model;
pub mod resolver;
pub mod variant;

pub use model::{Edge, GraphData, GraphStore, Node, NodeKey};
pub use resolver::{SubgraphResolver, VisibleSubgraph};
pub use variant::{VariantConfig, VariantKind, VariantRegistry};
