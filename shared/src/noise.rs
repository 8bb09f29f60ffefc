//! Tiled 2D gradient noise with fractal octave summation.
//!
//! The permutation table is fixed, so for a given `base` the field is
//! identical on every machine and in every process.

/// Ken Perlin's reference permutation.
const PERMUTATION: [u8; 256] = [
    151, 160, 137, 91, 90, 15, 131, 13, 201, 95, 96, 53, 194, 233, 7, 225, 140, 36, 103, 30, 69,
    142, 8, 99, 37, 240, 21, 10, 23, 190, 6, 148, 247, 120, 234, 75, 0, 26, 197, 62, 94, 252, 219,
    203, 117, 35, 11, 32, 57, 177, 33, 88, 237, 149, 56, 87, 174, 20, 125, 136, 171, 168, 68, 175,
    74, 165, 71, 134, 139, 48, 27, 166, 77, 146, 158, 231, 83, 111, 229, 122, 60, 211, 133, 230,
    220, 105, 92, 41, 55, 46, 245, 40, 244, 102, 143, 54, 65, 25, 63, 161, 1, 216, 80, 73, 209, 76,
    132, 187, 208, 89, 18, 169, 200, 196, 135, 130, 116, 188, 159, 86, 164, 100, 109, 198, 173,
    186, 3, 64, 52, 217, 226, 250, 124, 123, 5, 202, 38, 147, 118, 126, 255, 82, 85, 212, 207, 206,
    59, 227, 47, 16, 58, 17, 182, 189, 28, 42, 223, 183, 170, 213, 119, 248, 152, 2, 44, 154, 163,
    70, 221, 153, 101, 155, 167, 43, 172, 9, 129, 22, 39, 253, 19, 98, 108, 110, 79, 113, 224, 232,
    178, 185, 112, 104, 218, 246, 97, 228, 251, 34, 242, 193, 238, 210, 144, 12, 191, 179, 162,
    241, 81, 51, 145, 235, 249, 14, 239, 107, 49, 192, 214, 31, 181, 199, 106, 157, 184, 84, 204,
    176, 115, 121, 50, 45, 127, 4, 150, 254, 138, 236, 205, 93, 222, 114, 67, 29, 24, 72, 243, 141,
    128, 195, 78, 66, 215, 61, 156, 180,
];

/// Parameters of a fractal noise sum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseParams {
    pub octaves: u32,
    pub persistence: f32,
    pub lacunarity: f32,
    /// Tiling period of the first octave, in noise-space units.
    pub period: f32,
}

impl NoiseParams {
    /// Six octaves, used for the terrain surface.
    pub const TERRAIN: NoiseParams = NoiseParams {
        octaves: 6,
        persistence: 0.5,
        lacunarity: 2.0,
        period: 1024.0,
    };

    /// Two octaves, used for the smoothed bed under roads.
    pub const ROAD_BED: NoiseParams = NoiseParams {
        octaves: 2,
        persistence: 0.5,
        lacunarity: 2.0,
        period: 1024.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerlinNoise {
    offset_x: i64,
    offset_z: i64,
}

impl PerlinNoise {
    /// Creates a noise field shifted through the permutation table by `base`.
    pub fn new(base: u32) -> Self {
        Self {
            offset_x: i64::from(base & 0xFF),
            offset_z: i64::from((base >> 8) & 0xFF),
        }
    }

    /// Single octave of noise at `(x, z)`, tiling every `period` units.
    /// Returns a value in roughly `[-1, 1]`.
    pub fn sample(&self, x: f32, z: f32, period: f32) -> f32 {
        let x = x.rem_euclid(period);
        let z = z.rem_euclid(period);
        let cells = period as i64;

        let x0 = x.floor();
        let z0 = z.floor();
        let fx = x - x0;
        let fz = z - z0;

        let ix0 = x0 as i64;
        let iz0 = z0 as i64;
        let ix1 = (ix0 + 1) % cells.max(1);
        let iz1 = (iz0 + 1) % cells.max(1);

        let u = fade(fx);
        let v = fade(fz);

        let n00 = grad(self.hash(ix0, iz0), fx, fz);
        let n10 = grad(self.hash(ix1, iz0), fx - 1.0, fz);
        let n01 = grad(self.hash(ix0, iz1), fx, fz - 1.0);
        let n11 = grad(self.hash(ix1, iz1), fx - 1.0, fz - 1.0);

        lerp(v, lerp(u, n00, n10), lerp(u, n01, n11))
    }

    /// Fractal sum of octaves, normalised by total amplitude and clamped to
    /// `[-1, 1]`.
    pub fn fbm(&self, x: f32, z: f32, params: &NoiseParams) -> f32 {
        let mut total = 0.0;
        let mut max_amplitude = 0.0;
        let mut frequency = 1.0;
        let mut amplitude = 1.0;

        for _ in 0..params.octaves {
            total += self.sample(x * frequency, z * frequency, params.period * frequency) * amplitude;
            max_amplitude += amplitude;
            frequency *= params.lacunarity;
            amplitude *= params.persistence;
        }

        if max_amplitude == 0.0 {
            return 0.0;
        }
        (total / max_amplitude).clamp(-1.0, 1.0)
    }

    fn hash(&self, ix: i64, iz: i64) -> u8 {
        let a = PERMUTATION[((ix + self.offset_x) & 0xFF) as usize];
        PERMUTATION[((i64::from(a) + iz + self.offset_z) & 0xFF) as usize]
    }
}

fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(t: f32, a: f32, b: f32) -> f32 {
    a + t * (b - a)
}

fn grad(hash: u8, x: f32, z: f32) -> f32 {
    match hash & 7 {
        0 => x + z,
        1 => -x + z,
        2 => x - z,
        3 => -x - z,
        4 => x,
        5 => -x,
        6 => z,
        _ => -z,
    }
}
