//! End-to-end scenarios across store, retriever, generator and pipeline.
