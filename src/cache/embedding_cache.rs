use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Thread-safe LRU cache for query embeddings
///
/// Retriever tools embed the agent's query on every call; agents repeat
/// queries often, so the remote embedder sits behind this cache.
pub struct EmbeddingCache {
    cache: Mutex<LruCache<String, Vec<f32>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    /// Create a new embedding cache with the specified capacity
    /// 
    /// # Arguments
    /// 
    /// * `capacity` - Maximum number of embeddings to cache
    /// 
    /// A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        
        Self {
            cache: Mutex::new(LruCache::new(cap)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }
    
    /// Get a cached embedding for a query
    /// 
    /// # Arguments
    /// 
    /// * `query` - Query text to look up
    /// 
    /// # Returns
    /// 
    /// Some(embedding) if found in cache, None otherwise
    pub fn get(&self, query: &str) -> Option<Vec<f32>> {
        let found = self.cache
            .lock()
            .unwrap()
            .get(query)
            .cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (u64, u64) {
        (self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed))
    }
    
    /// Store an embedding in the cache
    /// 
    /// # Arguments
    /// 
    /// * `query` - Query text (used as key)
    /// * `embedding` - Embedding vector to cache
    pub fn put(&self, query: String, embedding: Vec<f32>) {
        self.cache
            .lock()
            .unwrap()
            .put(query, embedding);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_cache_put_and_get() {
        let cache = EmbeddingCache::new(10);
        
        let query = "population of bangladesh".to_string();
        let embedding = vec![1.0, 2.0, 3.0];
        
        cache.put(query.clone(), embedding.clone());
        
        let retrieved = cache.get(&query);
        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap(), embedding);
    }
    
    #[test]
    fn test_cache_miss() {
        let cache = EmbeddingCache::new(10);
        
        let retrieved = cache.get("nonexistent query");
        assert!(retrieved.is_none());
        assert_eq!(cache.stats(), (0, 1));
    }

    #[test]
    fn test_cache_stats_count_hits() {
        let cache = EmbeddingCache::new(10);
        cache.put("population of bangladesh".to_string(), vec![0.1]);

        let _ = cache.get("population of bangladesh");
        let _ = cache.get("population of bangladesh");
        let _ = cache.get("capital of bangladesh");

        assert_eq!(cache.stats(), (2, 1));
    }
    
    #[test]
    fn test_cache_eviction() {
        let cache = EmbeddingCache::new(2);
        
        // Fill cache to capacity
        cache.put("query1".to_string(), vec![1.0]);
        cache.put("query2".to_string(), vec![2.0]);
        
        // Add third entry - should evict query1 (LRU)
        cache.put("query3".to_string(), vec![3.0]);
        
        assert!(cache.get("query1").is_none()); // Evicted
        assert!(cache.get("query2").is_some()); // Still present
        assert!(cache.get("query3").is_some()); // New entry
    }
    
    #[test]
    fn test_cache_get_updates_lru() {
        let cache = EmbeddingCache::new(2);
        
        cache.put("query1".to_string(), vec![1.0]);
        cache.put("query2".to_string(), vec![2.0]);
        
        // Access query1 to update its position in LRU
        let _ = cache.get("query1");
        
        // Add third entry - should evict query2 (not query1, since it was recently accessed)
        cache.put("query3".to_string(), vec![3.0]);
        
        assert!(cache.get("query1").is_some()); // Still present (recently accessed)
        assert!(cache.get("query2").is_none()); // Evicted
        assert!(cache.get("query3").is_some()); // New entry
    }
    
    #[test]
    fn test_cache_capacity_one() {
        let cache = EmbeddingCache::new(1);
        
        cache.put("query1".to_string(), vec![1.0]);
        cache.put("query2".to_string(), vec![2.0]);
        assert!(cache.get("query1").is_none()); // Evicted
        assert!(cache.get("query2").is_some()); // Present
    }
}
