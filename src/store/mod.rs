//! In-memory data store — the demo's stand-in for a database.
//!
//! Three ordered collections (`users`, `products`, `cart`) live in process
//! memory with no persistence; their lifetime is process uptime. All
//! mutations to a collection are serialized through a mutex, so concurrent
//! requests cannot lose updates or mint duplicate ids.
//!
//! Record ids come from a per-collection monotonic counter rather than
//! `len() + 1`; the two agree while nothing is ever deleted, but the
//! counter stays collision-safe if deletion is ever added.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cart::CartLine;
use crate::resources::{Product, User};

/// An ordered, mutex-guarded sequence of rows with a monotonic id counter.
///
/// # Examples
///
/// ```
/// use cachelab::store::Collection;
///
/// let names: Collection<String> = Collection::new();
/// names.append("laptop".to_string());
/// names.append("laptop".to_string());
/// assert_eq!(names.len(), 2);
/// assert_eq!(names.remove_where(|n| n == "laptop"), 2);
/// assert!(names.is_empty());
/// ```
pub struct Collection<T> {
    rows: Mutex<Vec<T>>,
    next_id: AtomicU64,
}

impl<T: Clone> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Collection<T> {
    /// Creates an empty collection with its id counter at zero.
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Creates a collection pre-seeded with `rows`.
    ///
    /// The id counter starts at the row count, so the first appended record
    /// continues the seed's 1-based numbering.
    pub fn with_rows(rows: Vec<T>) -> Self {
        let next_id = AtomicU64::new(rows.len() as u64);
        Self {
            rows: Mutex::new(rows),
            next_id,
        }
    }

    /// Returns a snapshot of every row in insertion order.
    pub fn list(&self) -> Vec<T> {
        self.lock().clone()
    }

    /// Appends a row that does not carry an id (cart lines).
    pub fn append(&self, row: T) {
        self.lock().push(row);
    }

    /// Allocates the next id, builds the row with it, and appends it.
    ///
    /// Id allocation and the append happen under one lock acquisition, so
    /// two concurrent creates can never observe the same id or interleave.
    pub fn append_with_id(&self, build: impl FnOnce(u64) -> T) -> T {
        let mut rows = self.lock();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let row = build(id);
        rows.push(row.clone());
        row
    }

    /// Removes every row matching `pred`, returning how many were removed.
    pub fn remove_where(&self, pred: impl Fn(&T) -> bool) -> usize {
        let mut rows = self.lock();
        let before = rows.len();
        rows.retain(|row| !pred(row));
        before - rows.len()
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if the collection holds no rows.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<T>> {
        // A poisoned lock means a panic mid-mutation; the rows themselves
        // are always left in a valid state by the operations above.
        self.rows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The process-wide store: users, products, and the cart.
pub struct Store {
    pub users: Collection<User>,
    pub products: Collection<Product>,
    pub cart: Collection<CartLine>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            users: Collection::new(),
            products: Collection::new(),
            cart: Collection::new(),
        }
    }

    /// Creates a store seeded with the demo rows: three users, three
    /// products, an empty cart.
    pub fn with_demo_data() -> Self {
        let users = vec![
            User {
                id: 1,
                name: "John Doe".to_string(),
                email: "john@example.com".to_string(),
            },
            User {
                id: 2,
                name: "Jane Smith".to_string(),
                email: "jane@example.com".to_string(),
            },
            User {
                id: 3,
                name: "Bob Wilson".to_string(),
                email: "bob@example.com".to_string(),
            },
        ];
        let products = vec![
            Product {
                id: 1,
                name: "Laptop".to_string(),
                price: 999.99,
            },
            Product {
                id: 2,
                name: "Smartphone".to_string(),
                price: 699.99,
            },
            Product {
                id: 3,
                name: "Headphones".to_string(),
                price: 199.99,
            },
        ];
        Self {
            users: Collection::with_rows(users),
            products: Collection::with_rows(products),
            cart: Collection::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn ids_equal_one_based_position() {
        let store = Store::new();
        for i in 0..5u64 {
            let name = format!("user-{i}");
            store.users.append_with_id(|id| User {
                id,
                name: name.clone(),
                email: format!("{name}@example.com"),
            });
        }
        let users = store.users.list();
        assert_eq!(users.len(), 5);
        for (pos, user) in users.iter().enumerate() {
            assert_eq!(user.id, pos as u64 + 1);
        }
    }

    #[test]
    fn seeded_collection_continues_numbering() {
        let store = Store::with_demo_data();
        let created = store.products.append_with_id(|id| Product {
            id,
            name: "Tablet".to_string(),
            price: 299.99,
        });
        assert_eq!(created.id, 4);
        assert_eq!(store.products.len(), 4);
    }

    #[test]
    fn remove_where_removes_all_matches() {
        let lines: Collection<CartLine> = Collection::new();
        lines.append(CartLine {
            product_id: "p1".to_string(),
            quantity: 1,
        });
        lines.append(CartLine {
            product_id: "p1".to_string(),
            quantity: 2,
        });
        lines.append(CartLine {
            product_id: "p2".to_string(),
            quantity: 1,
        });
        assert_eq!(lines.remove_where(|l| l.product_id == "p1"), 2);
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn concurrent_creates_mint_unique_ids() {
        let store = Arc::new(Store::new());
        let mut handles = Vec::new();
        for t in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    store.users.append_with_id(|id| User {
                        id,
                        name: format!("user-{t}-{i}"),
                        email: format!("u{t}{i}@example.com"),
                    });
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let mut ids: Vec<u64> = store.users.list().iter().map(|u| u.id).collect();
        assert_eq!(ids.len(), 400);
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 400, "duplicate ids under concurrent creates");
    }
}
