pub mod batch_metas;
pub mod funnel_states;
pub mod questions;
pub mod seen_sets;
pub mod variant_overrides;
