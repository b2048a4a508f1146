mod output;
mod run;
mod semantic_search;
#[cfg(test)]
mod tests;

pub use run::run;
