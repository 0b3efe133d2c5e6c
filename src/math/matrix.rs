use std::io::{self, Read, Write};
use std::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Sub, SubAssign};
use std::thread;

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::math::scalar::Scalar;
use crate::math::wire;

/// Controls the worker fan-out inside [`Matrix::matmul_with`].
///
/// The multiply goes parallel once the output workload (`rows * rhs.cols`)
/// reaches `min_work_per_thread`; below that the serial kernel runs directly.
/// The policy is an explicit value rather than a process-wide tunable so
/// tests can pin either path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelPolicy {
    pub min_work_per_thread: usize,
}

impl ParallelPolicy {
    pub fn with_min_work(min_work_per_thread: usize) -> Self {
        ParallelPolicy { min_work_per_thread }
    }

    /// A policy that never spawns workers.
    pub fn serial() -> Self {
        ParallelPolicy {
            min_work_per_thread: usize::MAX,
        }
    }
}

impl Default for ParallelPolicy {
    fn default() -> Self {
        ParallelPolicy {
            min_work_per_thread: 16 * 1024,
        }
    }
}

/// Dense 2-D matrix over a flat row-major buffer.
///
/// The buffer length always equals `rows * cols`. Shape violations in
/// arithmetic are defects and panic; only persistence returns `io::Result`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matrix<T> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
}

impl<T: Scalar> Matrix<T> {
    /// Zero-filled matrix of the given shape.
    pub fn new(rows: usize, cols: usize) -> Self {
        Matrix {
            data: vec![T::ZERO; rows * cols],
            rows,
            cols,
        }
    }

    /// Wraps an existing row-major buffer.
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Self {
        assert_eq!(
            data.len(),
            rows * cols,
            "buffer length {} does not match a {rows}x{cols} matrix",
            data.len()
        );
        Matrix { data, rows, cols }
    }

    /// Matrix with elements drawn uniformly from `[min, max]` by a seeded
    /// generator. The same seed always produces the same matrix.
    pub fn random(rows: usize, cols: usize, min: T, max: T, seed: u64) -> Self {
        let between = Uniform::new_inclusive(min, max);
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..rows * cols).map(|_| between.sample(&mut rng)).collect();
        Matrix { data, rows, cols }
    }

    /// Maps an `N x 1` label column to an `N x num_classes` one-hot matrix.
    pub fn one_hot(labels: &Matrix<T>, num_classes: usize) -> Matrix<T> {
        assert_eq!(labels.cols, 1, "labels must be a single column");
        let mut encoded = Matrix::new(labels.rows, num_classes);
        for r in 0..labels.rows {
            let class = labels[(r, 0)].to_f64() as usize;
            assert!(
                class < num_classes,
                "label {class} at row {r} is out of range for {num_classes} classes"
            );
            encoded[(r, class)] = T::ONE;
        }
        encoded
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Checked element access; panics on out-of-range indices. The `Index`
    /// operator is the fast path and skips the row/column range check.
    pub fn at(&self, row: usize, col: usize) -> T {
        assert!(
            row < self.rows && col < self.cols,
            "index ({row}, {col}) out of bounds for {}x{} matrix",
            self.rows,
            self.cols
        );
        self.data[row * self.cols + col]
    }

    pub fn at_mut(&mut self, row: usize, col: usize) -> &mut T {
        assert!(
            row < self.rows && col < self.cols,
            "index ({row}, {col}) out of bounds for {}x{} matrix",
            self.rows,
            self.cols
        );
        &mut self.data[row * self.cols + col]
    }

    pub fn transpose(&self) -> Matrix<T> {
        let mut transposed = Matrix::new(self.cols, self.rows);
        for r in 0..self.rows {
            for c in 0..self.cols {
                transposed[(c, r)] = self[(r, c)];
            }
        }
        transposed
    }

    /// Applies `f` to every element, producing a new matrix.
    pub fn map<F: Fn(T) -> T>(&self, f: F) -> Matrix<T> {
        Matrix {
            data: self.data.iter().map(|&x| f(x)).collect(),
            rows: self.rows,
            cols: self.cols,
        }
    }

    /// Sums over all rows, producing a `1 x cols` row of column totals.
    pub fn collapse_rows(&self) -> Matrix<T> {
        assert!(self.rows > 0, "cannot collapse rows of an empty matrix");
        let mut collapsed = Matrix::new(1, self.cols);
        for c in 0..self.cols {
            let mut sum = T::ZERO;
            for r in 0..self.rows {
                sum += self[(r, c)];
            }
            collapsed[(0, c)] = sum;
        }
        collapsed
    }

    /// Sums over all columns, producing a `rows x 1` column of row totals.
    pub fn collapse_cols(&self) -> Matrix<T> {
        assert!(self.cols > 0, "cannot collapse columns of an empty matrix");
        let mut collapsed = Matrix::new(self.rows, 1);
        for r in 0..self.rows {
            let mut sum = T::ZERO;
            for c in 0..self.cols {
                sum += self[(r, c)];
            }
            collapsed[(r, 0)] = sum;
        }
        collapsed
    }

    /// Cyclically replicates rows up to `new_rows` (`result[r] = self[r % rows]`),
    /// e.g. to add a bias row across a whole batch.
    pub fn broadcast_rows(&self, new_rows: usize) -> Matrix<T> {
        assert!(
            new_rows >= self.rows,
            "cannot broadcast {} rows down to {new_rows}",
            self.rows
        );
        let mut broadcast = Matrix::new(new_rows, self.cols);
        for r in 0..new_rows {
            for c in 0..self.cols {
                broadcast[(r, c)] = self[(r % self.rows, c)];
            }
        }
        broadcast
    }

    /// Returns a copy with rows permuted by a seeded pseudo-random shuffle.
    /// The permutation depends only on the seed and the row count, so data
    /// and labels shuffled with the same seed stay paired.
    pub fn shuffle_rows(&self, seed: u64) -> Matrix<T> {
        let mut indices: Vec<usize> = (0..self.rows).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let mut shuffled = Matrix::new(self.rows, self.cols);
        for (r, &source) in indices.iter().enumerate() {
            for c in 0..self.cols {
                shuffled[(r, c)] = self[(source, c)];
            }
        }
        shuffled
    }

    /// Copies the row window `[start, end)` into a new matrix.
    pub fn slice_rows(&self, start: usize, end: usize) -> Matrix<T> {
        assert!(
            start <= end && end <= self.rows,
            "row range {start}..{end} out of bounds for {} rows",
            self.rows
        );
        Matrix {
            data: self.data[start * self.cols..end * self.cols].to_vec(),
            rows: end - start,
            cols: self.cols,
        }
    }

    pub fn argmax_row(&self, row: usize) -> usize {
        assert!(row < self.rows, "row index {row} out of bounds");
        let mut best = 0;
        for c in 1..self.cols {
            if self[(row, c)] > self[(row, best)] {
                best = c;
            }
        }
        best
    }

    pub fn argmin_row(&self, row: usize) -> usize {
        assert!(row < self.rows, "row index {row} out of bounds");
        let mut best = 0;
        for c in 1..self.cols {
            if self[(row, c)] < self[(row, best)] {
                best = c;
            }
        }
        best
    }

    pub fn argmax_col(&self, col: usize) -> usize {
        assert!(col < self.cols, "column index {col} out of bounds");
        let mut best = 0;
        for r in 1..self.rows {
            if self[(r, col)] > self[(best, col)] {
                best = r;
            }
        }
        best
    }

    pub fn argmin_col(&self, col: usize) -> usize {
        assert!(col < self.cols, "column index {col} out of bounds");
        let mut best = 0;
        for r in 1..self.rows {
            if self[(r, col)] < self[(best, col)] {
                best = r;
            }
        }
        best
    }

    pub fn max_in_row(&self, row: usize) -> T {
        self[(row, self.argmax_row(row))]
    }

    pub fn min_in_row(&self, row: usize) -> T {
        self[(row, self.argmin_row(row))]
    }

    pub fn max_in_col(&self, col: usize) -> T {
        self[(self.argmax_col(col), col)]
    }

    pub fn min_in_col(&self, col: usize) -> T {
        self[(self.argmin_col(col), col)]
    }

    /// Converts every element to `f32`, scaled.
    pub fn to_f32(&self, scale: f32) -> Matrix<f32> {
        Matrix {
            data: self.data.iter().map(|&x| x.to_f64() as f32 * scale).collect(),
            rows: self.rows,
            cols: self.cols,
        }
    }

    /// Converts every element to `f64`, scaled.
    pub fn to_f64(&self, scale: f64) -> Matrix<f64> {
        Matrix {
            data: self.data.iter().map(|&x| x.to_f64() * scale).collect(),
            rows: self.rows,
            cols: self.cols,
        }
    }

    /// Matrix product with the default [`ParallelPolicy`].
    pub fn matmul(&self, rhs: &Matrix<T>) -> Matrix<T> {
        self.matmul_with(rhs, &ParallelPolicy::default())
    }

    /// Matrix product, fanning output rows out across scoped worker threads
    /// once the workload clears `policy.min_work_per_thread`.
    ///
    /// Workers each run the serial kernel over a disjoint block of output
    /// rows, reading the shared operands, so the result is bit-identical to
    /// the serial path regardless of thread count.
    pub fn matmul_with(&self, rhs: &Matrix<T>, policy: &ParallelPolicy) -> Matrix<T> {
        assert_eq!(
            self.cols, rhs.rows,
            "cannot multiply a {}x{} matrix by a {}x{} matrix",
            self.rows, self.cols, rhs.rows, rhs.cols
        );

        let mut data = vec![T::ZERO; self.rows * rhs.cols];
        if data.is_empty() {
            return Matrix {
                data,
                rows: self.rows,
                cols: rhs.cols,
            };
        }

        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(self.rows);
        if data.len() >= policy.min_work_per_thread && workers > 1 {
            let rows_per_worker = (self.rows + workers - 1) / workers;
            thread::scope(|scope| {
                for (block, chunk) in data.chunks_mut(rows_per_worker * rhs.cols).enumerate() {
                    let first_row = block * rows_per_worker;
                    scope.spawn(move || self.mul_block(rhs, first_row, chunk));
                }
            });
        } else {
            self.mul_block(rhs, 0, &mut data);
        }

        Matrix {
            data,
            rows: self.rows,
            cols: rhs.cols,
        }
    }

    /// Serial product kernel for the output rows starting at `first_row`;
    /// `out` holds exactly the rows this call owns.
    fn mul_block(&self, rhs: &Matrix<T>, first_row: usize, out: &mut [T]) {
        let block_rows = out.len() / rhs.cols;
        for r in 0..block_rows {
            for c in 0..rhs.cols {
                let mut sum = T::ZERO;
                for k in 0..self.cols {
                    sum += self[(first_row + r, k)] * rhs[(k, c)];
                }
                out[r * rhs.cols + c] = sum;
            }
        }
    }

    /// Writes `[rows: u64][cols: u64][elements]`, all little-endian.
    pub fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        wire::write_u64(out, self.rows as u64)?;
        wire::write_u64(out, self.cols as u64)?;
        for &value in &self.data {
            value.write_le(out)?;
        }
        Ok(())
    }

    /// Reads a matrix written by [`Matrix::write_to`]. Header corruption is
    /// `InvalidData`; a short element buffer surfaces as `UnexpectedEof`.
    pub fn read_from(input: &mut dyn Read) -> io::Result<Matrix<T>> {
        let rows = usize::try_from(wire::read_u64(input)?)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "matrix row count overflow"))?;
        let cols = usize::try_from(wire::read_u64(input)?).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, "matrix column count overflow")
        })?;
        let len = rows.checked_mul(cols).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("matrix dimensions {rows}x{cols} overflow the element count"),
            )
        })?;

        let mut data = Vec::with_capacity(len);
        for _ in 0..len {
            data.push(T::read_le(input)?);
        }
        Ok(Matrix { data, rows, cols })
    }
}

impl<T: Scalar> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        &self.data[row * self.cols + col]
    }
}

impl<T: Scalar> IndexMut<(usize, usize)> for Matrix<T> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        let idx = row * self.cols + col;
        &mut self.data[idx]
    }
}

impl<'a, T: Scalar> Add for &'a Matrix<T> {
    type Output = Matrix<T>;

    fn add(self, rhs: Self) -> Matrix<T> {
        assert_eq!(
            (self.rows, self.cols),
            (rhs.rows, rhs.cols),
            "matrix dimensions must match for addition"
        );
        Matrix {
            data: self
                .data
                .iter()
                .zip(&rhs.data)
                .map(|(&a, &b)| a + b)
                .collect(),
            rows: self.rows,
            cols: self.cols,
        }
    }
}

impl<'a, T: Scalar> Sub for &'a Matrix<T> {
    type Output = Matrix<T>;

    fn sub(self, rhs: Self) -> Matrix<T> {
        assert_eq!(
            (self.rows, self.cols),
            (rhs.rows, rhs.cols),
            "matrix dimensions must match for subtraction"
        );
        Matrix {
            data: self
                .data
                .iter()
                .zip(&rhs.data)
                .map(|(&a, &b)| a - b)
                .collect(),
            rows: self.rows,
            cols: self.cols,
        }
    }
}

/// Matrix product.
impl<'a, 'b, T: Scalar> Mul<&'b Matrix<T>> for &'a Matrix<T> {
    type Output = Matrix<T>;

    fn mul(self, rhs: &'b Matrix<T>) -> Matrix<T> {
        self.matmul(rhs)
    }
}

impl<'a, T: Scalar> Mul<T> for &'a Matrix<T> {
    type Output = Matrix<T>;

    fn mul(self, scalar: T) -> Matrix<T> {
        self.map(|x| x * scalar)
    }
}

impl<'a, T: Scalar> Div<T> for &'a Matrix<T> {
    type Output = Matrix<T>;

    fn div(self, scalar: T) -> Matrix<T> {
        assert!(scalar != T::ZERO, "division by zero scalar");
        self.map(|x| x / scalar)
    }
}

impl<'a, T: Scalar> Add<T> for &'a Matrix<T> {
    type Output = Matrix<T>;

    fn add(self, scalar: T) -> Matrix<T> {
        self.map(|x| x + scalar)
    }
}

impl<'a, T: Scalar> Sub<T> for &'a Matrix<T> {
    type Output = Matrix<T>;

    fn sub(self, scalar: T) -> Matrix<T> {
        self.map(|x| x - scalar)
    }
}

// Scalar-on-the-left orderings. Blanket impls are blocked by the orphan
// rule, so these are stamped out per element type.
macro_rules! impl_scalar_lhs_ops {
    ($($ty:ty),*) => {$(
        impl Mul<&Matrix<$ty>> for $ty {
            type Output = Matrix<$ty>;

            fn mul(self, rhs: &Matrix<$ty>) -> Matrix<$ty> {
                rhs.map(|x| self * x)
            }
        }

        impl Add<&Matrix<$ty>> for $ty {
            type Output = Matrix<$ty>;

            fn add(self, rhs: &Matrix<$ty>) -> Matrix<$ty> {
                rhs.map(|x| self + x)
            }
        }

        impl Sub<&Matrix<$ty>> for $ty {
            type Output = Matrix<$ty>;

            fn sub(self, rhs: &Matrix<$ty>) -> Matrix<$ty> {
                rhs.map(|x| self - x)
            }
        }

        impl Div<&Matrix<$ty>> for $ty {
            type Output = Matrix<$ty>;

            fn div(self, rhs: &Matrix<$ty>) -> Matrix<$ty> {
                rhs.map(|x| {
                    assert!(x != <$ty as Scalar>::ZERO, "division by zero matrix element");
                    self / x
                })
            }
        }
    )*};
}

impl_scalar_lhs_ops!(u8, i32, f32, f64);

impl<T: Scalar> AddAssign<&Matrix<T>> for Matrix<T> {
    fn add_assign(&mut self, rhs: &Matrix<T>) {
        assert_eq!(
            (self.rows, self.cols),
            (rhs.rows, rhs.cols),
            "matrix dimensions must match for addition"
        );
        for (a, &b) in self.data.iter_mut().zip(&rhs.data) {
            *a += b;
        }
    }
}

impl<T: Scalar> SubAssign<&Matrix<T>> for Matrix<T> {
    fn sub_assign(&mut self, rhs: &Matrix<T>) {
        assert_eq!(
            (self.rows, self.cols),
            (rhs.rows, rhs.cols),
            "matrix dimensions must match for subtraction"
        );
        for (a, &b) in self.data.iter_mut().zip(&rhs.data) {
            *a -= b;
        }
    }
}

impl<T: Scalar> MulAssign<T> for Matrix<T> {
    fn mul_assign(&mut self, scalar: T) {
        for value in &mut self.data {
            *value *= scalar;
        }
    }
}

impl<T: Scalar> DivAssign<T> for Matrix<T> {
    fn div_assign(&mut self, scalar: T) {
        assert!(scalar != T::ZERO, "division by zero scalar");
        for value in &mut self.data {
            *value /= scalar;
        }
    }
}

impl<T: Scalar> AddAssign<T> for Matrix<T> {
    fn add_assign(&mut self, scalar: T) {
        for value in &mut self.data {
            *value += scalar;
        }
    }
}

impl<T: Scalar> SubAssign<T> for Matrix<T> {
    fn sub_assign(&mut self, scalar: T) {
        for value in &mut self.data {
            *value -= scalar;
        }
    }
}
