use crate::models::Dog;

/// Favorited dogs in the order they were added, unique by id.
///
/// Independent of the displayed page: a dog stays favorited across
/// pagination and filter changes until toggled off or cleared.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FavoritesSet {
    dogs: Vec<Dog>,
}

impl FavoritesSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from saved state, dropping duplicate ids
    pub fn from_dogs(dogs: Vec<Dog>) -> Self {
        let mut set = Self::new();
        for dog in dogs {
            if !set.contains(&dog.id) {
                set.dogs.push(dog);
            }
        }
        set
    }

    /// Add if absent, remove if present. Returns whether `dog` is now a favorite.
    pub fn toggle(&mut self, dog: &Dog) -> bool {
        if let Some(pos) = self.dogs.iter().position(|d| d.id == dog.id) {
            self.dogs.remove(pos);
            false
        } else {
            self.dogs.push(dog.clone());
            true
        }
    }

    pub fn clear(&mut self) {
        self.dogs.clear();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.dogs.iter().any(|d| d.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Dog> {
        self.dogs.iter().find(|d| d.id == id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.dogs.iter().map(|d| d.id.clone()).collect()
    }

    pub fn dogs(&self) -> &[Dog] {
        &self.dogs
    }

    pub fn len(&self) -> usize {
        self.dogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dogs.is_empty()
    }
}
