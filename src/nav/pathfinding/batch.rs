use rayon::prelude::*;
use tilenav_macros::profile;

use super::types::{PathOutcome, PathRequest};
use super::Pathfinder;
use crate::nav::grid::CollisionGrid;
use crate::nav::spatial_index::SpatialIndex;
use crate::nav::types::Position;

impl Pathfinder {
    /// Plan many paths on the rayon pool. Each task rents its own context and
    /// only reads `grid` and `index`. Results come back in request order.
    #[profile(2)]
    pub fn find_paths_batch(
        &self,
        grid: &dyn CollisionGrid,
        index: Option<&SpatialIndex>,
        requests: &[PathRequest],
    ) -> Vec<PathOutcome> {
        let capacity = self.config.max_path_len;
        requests
            .par_iter()
            .map_init(
                || vec![Position::default(); capacity],
                |buffer, request| {
                    let result = self.find_path(grid, index, request, buffer);
                    PathOutcome { result, path: buffer[..result.len].to_vec() }
                },
            )
            .collect()
    }
}
