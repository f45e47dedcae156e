/// Batch size target walking the Fibonacci sequence.
///
/// Seeded at `(0, 0, 1)`. Growing shifts `a <- b`, `b <- c`, then `c <- a + b`
/// using the shifted values; shrinking is the exact inverse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FibonacciSizer {
    a: usize,
    b: usize,
    c: usize,
    growing: bool,
    ceiling: usize,
}

impl FibonacciSizer {
    pub fn new(ceiling: usize) -> Self {
        FibonacciSizer {
            a: 0,
            b: 0,
            c: 1,
            growing: true,
            ceiling: ceiling.max(1),
        }
    }

    pub fn target(&self) -> usize {
        self.c
    }

    pub fn is_growing(&self) -> bool {
        self.growing
    }

    pub fn reverse(&mut self) {
        self.growing = !self.growing;
    }

    /// Moves one step in the current direction.
    pub fn step(&mut self) {
        if self.growing {
            self.grow();
        } else {
            self.shrink();
        }
    }

    pub fn grow(&mut self) {
        let next = self.b + self.c;
        if next > self.ceiling {
            return;
        }
        self.a = self.b;
        self.b = self.c;
        self.c = self.a + self.b;
    }

    pub fn shrink(&mut self) {
        if self.c > 1 {
            self.c = self.b;
            self.b = self.a;
            self.a = self.c.saturating_sub(self.b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_sequence() {
        let mut sizer = FibonacciSizer::new(1000);
        let mut seen = vec![sizer.target()];
        for _ in 0..6 {
            sizer.grow();
            seen.push(sizer.target());
        }
        assert_eq!(seen, vec![1, 1, 2, 3, 5, 8, 13]);
    }

    #[test]
    fn test_shrink_inverts_growth() {
        let mut sizer = FibonacciSizer::new(1000);
        for _ in 0..5 {
            sizer.grow();
        }
        assert_eq!(sizer.target(), 8);

        let mut seen = Vec::new();
        for _ in 0..6 {
            sizer.shrink();
            seen.push(sizer.target());
        }
        assert_eq!(seen, vec![5, 3, 2, 1, 1, 1]);
    }

    #[test]
    fn test_ceiling_caps_growth() {
        let mut sizer = FibonacciSizer::new(10);
        for _ in 0..20 {
            sizer.grow();
        }
        assert_eq!(sizer.target(), 8);
    }

    #[test]
    fn test_step_follows_direction() {
        let mut sizer = FibonacciSizer::new(100);
        sizer.step();
        sizer.step();
        assert_eq!(sizer.target(), 2);

        sizer.reverse();
        assert!(!sizer.is_growing());
        sizer.step();
        assert_eq!(sizer.target(), 1);
    }
}
